//! The store integration layer.
//!
//! A [`SyncStore`] wraps a user-supplied reducer and runs the dispatch
//! pipeline: reduce, bump versions for changed synchronized keys, commit,
//! diff. Inbound snapshots and update batches are applied against the
//! same state cell. One mutation runs to completion before the next.

use crate::action::Action;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use parking_lot::Mutex;
use statebus_protocol::{
    apply_update_batch, bump, find_versioned_changes, merge_snapshot, versions_of,
    versions_to_value, InitialSyncPayload, UpdateBatch, VersionMap,
};
use statebus_state::{set_path, Value, VERSIONS_KEY};

/// The reducer: a pure function from state and action to the next state.
pub type Reducer = Box<dyn Fn(&Value, &Action) -> Value + Send + Sync>;

/// The result of one local dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreTransition {
    /// The versioned changes this dispatch produced on synchronized keys.
    pub batch: UpdateBatch,
    /// Whether the action matched the configured rehydration action.
    pub matched_rehydration: bool,
}

/// A state store with versioned synchronization bookkeeping.
pub struct SyncStore {
    config: SyncConfig,
    reducer: Reducer,
    state: Mutex<Value>,
}

impl SyncStore {
    /// Creates a store after validating the config.
    pub fn new(config: SyncConfig, reducer: Reducer, initial: Value) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reducer,
            state: Mutex::new(initial),
        })
    }

    /// The synchronization config.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> Value {
        self.state.lock().clone()
    }

    /// The committed version map.
    pub fn versions(&self) -> VersionMap {
        versions_of(&self.state.lock())
    }

    /// Runs the dispatch pipeline for a local action.
    ///
    /// Every synchronized, version-tracked key whose value changed gets
    /// its version bumped before commit, so the returned batch carries
    /// the versions the peer will be checked against.
    pub fn dispatch(&self, action: &Action) -> StoreTransition {
        let versioned_keys = self.config.versioned_keys();
        let mut state = self.state.lock();
        let old = state.clone();

        let mut next = (self.reducer)(&old, action);

        let mut versions = versions_of(&next);
        let mut bumped = false;
        for key in &versioned_keys {
            // An absent key and an explicit null are the same value, so
            // the bump condition matches what the diff will see.
            let new_value = next.get(key).unwrap_or(&Value::Null);
            let old_value = old.get(key).unwrap_or(&Value::Null);
            if new_value != old_value {
                bump(&mut versions, key);
                bumped = true;
            }
        }
        if bumped {
            next = set_path(&next, &[VERSIONS_KEY], versions_to_value(&versions));
        }

        let batch = find_versioned_changes(&next, &old, &versioned_keys);
        *state = next;

        StoreTransition {
            batch,
            matched_rehydration: self.config.wait_for_action() == Some(action.name.as_str()),
        }
    }

    /// Merges an authoritative snapshot into the state.
    pub fn apply_snapshot(&self, payload: &InitialSyncPayload) {
        let mut state = self.state.lock();
        *state = merge_snapshot(&state, payload);
    }

    /// Applies an inbound update batch. Returns true when an
    /// out-of-sequence version was seen and a resync should follow.
    pub fn apply_batch(&self, batch: &UpdateBatch) -> bool {
        let mut state = self.state.lock();
        let outcome = apply_update_batch(&state, batch, self.config.keys());
        *state = outcome.state;
        outcome.should_resync
    }
}
