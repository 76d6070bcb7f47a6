//! Structured errors for the offcache host.
//!
//! Engine failures arrive as `offcache_core::Error` and convert on their own;
//! these cover what the host rejects before reaching the worker.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for the offcache host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Invalid tool parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),
}

impl From<HostError> for McpError {
    fn from(err: HostError) -> Self {
        let (code, message) = match &err {
            HostError::InvalidInput(msg) => (-32602, msg.clone()),
            HostError::Serialize(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Serialize(err.to_string())
    }
}
