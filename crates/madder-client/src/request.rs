//! Outbound request values.
//!
//! A [`Request`] serializes to `{"method": ..., "path": ..., "entity": ...}`,
//! the record the editor backend routes on.

use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Operation kind of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Create,
    Update,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "Get",
            Method::Create => "Create",
            Method::Update => "Update",
            Method::Delete => "Delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One outbound operation against a resource path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    method: Method,
    path: String,
    entity: Value,
}

impl Request {
    /// Build a request of any method.
    pub fn new(method: Method, path: impl Into<String>, entity: Value) -> Self {
        Self {
            method,
            path: path.into(),
            entity,
        }
    }

    /// Read a resource. The entity is an empty object.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, Value::Object(Default::default()))
    }

    pub fn create(path: impl Into<String>, entity: Value) -> Self {
        Self::new(Method::Create, path, entity)
    }

    pub fn update(path: impl Into<String>, entity: Value) -> Self {
        Self::new(Method::Update, path, entity)
    }

    pub fn delete(path: impl Into<String>, entity: Value) -> Self {
        Self::new(Method::Delete, path, entity)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entity(&self) -> &Value {
        &self.entity
    }

    /// Check that the request can be put on the wire.
    ///
    /// Paths are resource locations like `/component/7` and must be absolute.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(ClientError::InvalidRequest {
                path: self.path.clone(),
                message: "path is empty".to_string(),
            });
        }
        if !self.path.starts_with('/') {
            return Err(ClientError::InvalidRequest {
                path: self.path.clone(),
                message: "path must start with '/'".to_string(),
            });
        }
        Ok(())
    }

    /// Validate and serialize into a single wire message.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }
}
