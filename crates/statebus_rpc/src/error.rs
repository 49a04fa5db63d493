//! Error types for the RPC layer.

use thiserror::Error;

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur on an RPC call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The call did not complete within the deadline.
    #[error("rpc call timed out")]
    Timeout,

    /// The transport or client is gone.
    #[error("rpc channel closed")]
    Closed,

    /// The remote side answered with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// No service registered under this name.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The service has no such method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A message did not have the expected shape.
    #[error("malformed rpc message: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Creates a malformed-message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
