//! # Statebus Sync Protocol
//!
//! Pure protocol logic for versioned state synchronization.
//!
//! This crate provides:
//! - [`ChangeRecord`] / change sets from a structural diff with a
//!   size-bounding fallback rule
//! - [`VersionMap`] bookkeeping (per-key monotonic counters, gap checks)
//! - The reconciler that applies versioned update batches
//! - [`InitialSyncPayload`] resync snapshots
//! - Wire messages with CBOR codecs
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod diff;
mod error;
mod messages;
mod reconcile;
mod snapshot;
mod version;

pub use change::{ChangeRecord, ChangeSet, UpdateBatch, VersionedUpdate};
pub use diff::{find_changes, find_versioned_changes};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::SyncMessage;
pub use reconcile::{apply_update_batch, ApplyOutcome};
pub use snapshot::{collect_new_versions, merge_snapshot, InitialSyncPayload};
pub use version::{bump, is_next_version, versions_of, versions_to_value, VersionMap};
