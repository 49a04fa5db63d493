//! Error types for the sync server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A sync engine failure, usually invalid configuration.
    #[error("sync error: {0}")]
    Sync(#[from] statebus_engine::SyncError),

    /// A transport failure, usually a bind problem.
    #[error("transport error: {0}")]
    Transport(#[from] statebus_transport::TransportError),
}
