//! # Statebus Testkit
//!
//! Test utilities for statebus.
//!
//! This crate provides:
//! - Property-based test generators for state trees and version maps
//! - Canned reducers, stores, and versioned-state fixtures
//! - A two-peer scenario harness over loopback transports

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenario;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenario::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scenario::*;
