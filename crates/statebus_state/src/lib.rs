//! # Statebus State
//!
//! Dynamic state tree and CBOR codec for statebus.
//!
//! This crate provides:
//! - [`Value`] — an arbitrarily nested tree of maps, arrays and scalars
//! - Path operations (`get_path`, `set_path`, `remove_path`)
//! - CBOR encoding/decoding via `ciborium`
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod path;
mod value;

pub use codec::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use path::{get_path, remove_path, set_path};
pub use value::Value;

/// Reserved top-level key that holds the per-key version map inside the
/// state tree. It must never collide with a synchronized key name.
pub const VERSIONS_KEY: &str = "versions";
