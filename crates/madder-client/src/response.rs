//! Inbound response envelope.

use crate::config::ProtocolConfig;
use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{status, body}` pair carried by every inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: i64,
    #[serde(default)]
    pub body: Value,
}

impl ResponseEnvelope {
    /// Create a success envelope.
    pub fn ok(body: Value) -> Self {
        Self {
            status: ProtocolConfig::SUCCESS_STATUS,
            body,
        }
    }

    /// Create a failure envelope.
    pub fn error(status: i64, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProtocolConfig::SUCCESS_STATUS
    }

    /// Decode one raw inbound message.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(ClientError::decode)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
