//! # Statebus Sync Engine
//!
//! Versioned state synchronization between two peers.
//!
//! A [`SyncStore`] wraps a user reducer and keeps per-key version
//! counters for the synchronized top-level keys. The [`ClientEndpoint`]
//! tracks an authoritative peer: it opens with a version check (gated on
//! transport availability and local rehydration), merges snapshots, and
//! applies incremental update batches, falling back to a fresh check
//! whenever a version gap appears. The [`ServerEndpoint`] owns the keys:
//! it answers version checks with snapshots and broadcasts update
//! batches after every local transition.
//!
//! Both endpoints are [`ProtocolHandler`]s and register on a transport
//! under a shared protocol name, conventionally [`SYNC_PROTOCOL`].
//!
//! [`ProtocolHandler`]: statebus_transport::ProtocolHandler

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod client;
mod config;
mod error;
mod server;
mod store;

pub use action::{Action, Direction};
pub use client::ClientEndpoint;
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use server::ServerEndpoint;
pub use store::{Reducer, StoreTransition, SyncStore};

/// The conventional protocol name sync endpoints register under.
pub const SYNC_PROTOCOL: &str = "sync";
