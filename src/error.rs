//! Error types for the relay
//!
//! Every error that can come out of handling a single inbound message is
//! recoverable: the session turns it into an `error` reply and keeps the
//! connection open. Only server start-up failures are fatal.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relay operations
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or listener I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket transport failure
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// Inbound text is not a well-formed record of a known shape
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The `audio` field is not valid base64
    #[error("invalid audio payload: {0}")]
    InvalidAudio(#[from] base64::DecodeError),

    /// A control message named an empty stream
    #[error("streamId must not be empty")]
    EmptyStreamId,

    /// Only text frames carry protocol records
    #[error("unsupported frame: only text messages are accepted")]
    UnsupportedFrame,

    /// The message is valid but not allowed in the connection's current role
    #[error("{message} (current role: {role})")]
    RoleViolation {
        /// Role the connection is bound to
        role: &'static str,
        /// What was attempted
        message: &'static str,
    },
}

impl Error {
    /// Whether this error came from the peer's input rather than the relay itself
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Transport(_))
    }
}
