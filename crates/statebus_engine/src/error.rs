//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// Synchronization itself never surfaces errors to the application:
/// version mismatches heal through resync and malformed messages are
/// dropped at the boundary. What remains is setup-time validation and
/// pass-through from the layers below.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The synchronization configuration is invalid.
    #[error("invalid sync config: {0}")]
    Config(String),

    /// A protocol-level failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] statebus_protocol::ProtocolError),

    /// A transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] statebus_transport::TransportError),
}

impl SyncError {
    /// Creates a config validation error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
