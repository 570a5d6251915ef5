//! Centralized configuration for the madder client.
//!
//! Protocol constants and network limits shared by the correlation layer,
//! the TCP transport and the command-line client.

use std::time::Duration;

/// Wire protocol constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// The only status that counts as success.
    pub const SUCCESS_STATUS: i64 = 200;
    pub const BAD_REQUEST_STATUS: i64 = 400;
    pub const INTERNAL_ERROR_STATUS: i64 = 500;
}

/// Network-related configuration.
pub struct NetConfig;

impl NetConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 3000;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB
    pub const MAX_CONNECTIONS: usize = 16;
}
