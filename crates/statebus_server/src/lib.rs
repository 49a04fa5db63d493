//! # Statebus Server
//!
//! The authoritative sync hub: a [`SyncServer`] binds a TCP listener,
//! serves versioned state to every connected client, and hosts RPC
//! services on the same connections.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::SyncServer;
