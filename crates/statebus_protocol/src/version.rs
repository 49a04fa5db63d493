//! Per-key version bookkeeping.
//!
//! Every synchronized key carries a monotonically increasing counter. A
//! correctly reconciling peer observes the exact sequence 1, 2, 3, … for a
//! key; any deviation from `expected + 1` signals a gap or duplicate and
//! triggers resynchronization instead of being silently skipped.

use statebus_state::{Value, VERSIONS_KEY};
use std::collections::BTreeMap;

/// Mapping from synchronized key to its committed version.
pub type VersionMap = BTreeMap<String, u64>;

/// Increments the version for `key` by one.
///
/// A missing entry is initialized to 0 first, so the first bump yields 1.
pub fn bump(versions: &mut VersionMap, key: &str) -> u64 {
    let entry = versions.entry(key.to_string()).or_insert(0);
    *entry += 1;
    *entry
}

/// Returns true iff `candidate` is exactly one greater than the committed
/// version for `key` (missing key treated as 0).
///
/// The check is a strict equality against `expected + 1`: versions running
/// ahead and versions running behind both fail it.
pub fn is_next_version(versions: &VersionMap, key: &str, candidate: u64) -> bool {
    let current = versions.get(key).copied().unwrap_or(0);
    candidate == current + 1
}

/// Reads the version map stored under the reserved `versions` key of a
/// state tree. A missing or malformed entry reads as empty.
pub fn versions_of(state: &Value) -> VersionMap {
    let Some(map) = state.get(VERSIONS_KEY).and_then(Value::as_map) else {
        return VersionMap::new();
    };

    map.iter()
        .filter_map(|(key, value)| {
            value
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .map(|version| (key.clone(), version))
        })
        .collect()
}

/// Encodes a version map as a state value.
pub fn versions_to_value(versions: &VersionMap) -> Value {
    Value::Map(
        versions
            .iter()
            .map(|(key, version)| (key.clone(), Value::from(*version)))
            .collect(),
    )
}
