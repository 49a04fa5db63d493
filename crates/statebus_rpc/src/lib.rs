//! # Statebus RPC
//!
//! Request/response calls multiplexed beside the sync protocol on the
//! same transport.
//!
//! An [`RpcClient`] correlates calls with responses by a monotonically
//! increasing id and enforces a per-call deadline; an [`RpcServer`]
//! dispatches to explicitly registered [`RpcService`]s. Both are
//! [`ProtocolHandler`]s and conventionally register under
//! [`RPC_PROTOCOL`].
//!
//! [`ProtocolHandler`]: statebus_transport::ProtocolHandler

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod message;
mod server;

pub use client::{RpcClient, DEFAULT_CALL_TIMEOUT};
pub use error::{RpcError, RpcResult};
pub use message::{RpcRequest, RpcResponse};
pub use server::{RpcServer, RpcService};

/// The conventional protocol name RPC endpoints register under.
pub const RPC_PROTOCOL: &str = "rpc";
