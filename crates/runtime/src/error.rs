//! Error types for the lockstep runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the lockstep runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure: the underlying channel itself dropped,
    /// stalled, or refused the connection. Always retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level failure (malformed or unexpected wire data).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid endpoint configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal channel closed unexpectedly.
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl Error {
    /// Returns true if this failure is transport-level, i.e. the session
    /// should tear down and retry rather than give up.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
