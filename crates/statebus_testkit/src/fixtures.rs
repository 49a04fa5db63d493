//! Canned reducers, states, and stores for sync tests.

use statebus_engine::{Reducer, SyncConfig, SyncStore};
use statebus_state::{set_path, Value, VERSIONS_KEY};
use std::sync::Arc;

/// Applies a change set to a base state, record by record.
pub fn apply_changes(changes: &statebus_protocol::ChangeSet, base: &Value) -> Value {
    let mut state = base.clone();
    for record in changes {
        state = match record {
            statebus_protocol::ChangeRecord::Set { path, value } => {
                set_path(&state, path, value.clone())
            }
            statebus_protocol::ChangeRecord::Remove { path } => {
                statebus_state::remove_path(&state, path)
            }
        };
    }
    state
}

/// A reducer covering the common test actions:
/// - `increment` adds one to the `count` key
/// - `set:<key>` writes the payload at that top-level key
/// - anything else is a no-op
pub fn test_reducer() -> Reducer {
    Box::new(|state, action| {
        if action.name == "increment" {
            let count = state.get("count").and_then(Value::as_integer).unwrap_or(0);
            return set_path(state, &["count"], Value::Integer(count + 1));
        }
        if let Some(key) = action.name.strip_prefix("set:") {
            return set_path(state, &[key], action.payload.clone());
        }
        state.clone()
    })
}

/// Builds a store over [`test_reducer`] starting from an empty state.
pub fn test_store(config: SyncConfig) -> Arc<SyncStore> {
    Arc::new(
        SyncStore::new(config, test_reducer(), Value::empty_map())
            .expect("test config must be valid"),
    )
}

/// Builds a state with values and committed versions for the given keys.
pub fn versioned_state(entries: Vec<(&str, Value, u64)>) -> Value {
    let mut state = Value::empty_map();
    for (key, value, version) in entries {
        state = set_path(&state, &[key], value);
        state = set_path(&state, &[VERSIONS_KEY, key], Value::from(version));
    }
    state
}
