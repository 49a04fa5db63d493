//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Codec failure on the underlying value encoding.
    #[error("codec error: {0}")]
    Codec(#[from] statebus_state::CodecError),

    /// The message did not have the expected shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The message type tag was not recognized.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

impl ProtocolError {
    /// Creates a malformed-message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
