//! Error types for the tmrb-rpc crate.
//!
//! Channel operations never surface these to callers; they are logged at debug
//! level and flattened into a disconnected channel plus an empty result.

use crate::transport::CodecError;

/// Transport failure on the control channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not connected")]
    Disconnected,

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,
}

impl From<tokio::time::error::Elapsed> for ChannelError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
