//! Error types for the transport layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur in the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection (or its send queue) is closed.
    #[error("connection closed")]
    Closed,

    /// The addressed connection does not exist.
    #[error("no such connection: {0}")]
    NoSuchConnection(String),

    /// Targeted sends are only available on multi-connection transports.
    #[error("send_to is only available on server transports")]
    SendToUnsupported,

    /// An inbound or outbound frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] statebus_state::CodecError),

    /// A frame exceeded the maximum allowed length.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
