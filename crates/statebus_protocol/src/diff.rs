//! Structural diff between two state trees.
//!
//! The diff walks immediate children level by level, recursing only when
//! both sides are maps. A fallback rule bounds worst-case diff size: when
//! too large a share of a node's children changed, the whole subtree is
//! reported as replaced instead of a sprawling list of child records.

use crate::change::{ChangeRecord, ChangeSet, UpdateBatch, VersionedUpdate};
use crate::version::versions_of;
use statebus_state::Value;
use std::collections::BTreeMap;

/// Minimum number of records before the fallback rule can trigger.
const FALLBACK_MIN_RECORDS: usize = 2;

/// Fraction of changed children above which the fallback rule triggers.
const FALLBACK_RATIO: f64 = 0.4;

/// Returns true when the accumulated records at one level should collapse
/// into a single whole-subtree replacement.
///
/// With zero child keys in the new value the ratio counts as exceeded, so
/// any records past the minimum collapse.
fn exceeds_fallback(records: usize, new_key_count: usize) -> bool {
    if records <= FALLBACK_MIN_RECORDS {
        return false;
    }
    if new_key_count == 0 {
        return true;
    }
    records as f64 / new_key_count as f64 > FALLBACK_RATIO
}

fn empty_children() -> &'static BTreeMap<String, Value> {
    static EMPTY: std::sync::OnceLock<BTreeMap<String, Value>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(BTreeMap::new)
}

/// Map children of a value; absent, null, and non-map values all count as
/// having no children.
fn children(value: &Value) -> &BTreeMap<String, Value> {
    value.as_map().unwrap_or_else(|| empty_children())
}

/// Computes the change set turning `old` into `new`, rooted at `path`.
///
/// - Differing values with a scalar on either side yield the single record
///   `Set { path, value: new }`; the child walk only applies between maps
///   (with null standing in for an empty map).
/// - A child present in both sides with differing values yields a `Set`
///   record when either side is not a map, and recurses when both are maps.
/// - A child present only in the old side yields a `Remove` record.
/// - When the fallback rule triggers, the result is the single record
///   `Set { path, value: new }`.
///
/// An empty change set means no observable difference.
pub fn find_changes(new: &Value, old: &Value, path: &[String]) -> ChangeSet {
    if new == old {
        return Vec::new();
    }

    // A scalar on either side has no child structure to walk; the value is
    // replaced wholesale.
    let new_is_leaf = !new.is_map() && !new.is_null();
    let old_is_leaf = !old.is_map() && !old.is_null();
    if new_is_leaf || old_is_leaf {
        return vec![ChangeRecord::set(path.to_vec(), new.clone())];
    }

    let new_children = children(new);
    let old_children = children(old);
    let new_key_count = new_children.len();

    let mut records: ChangeSet = Vec::new();

    for (key, new_child) in new_children {
        if exceeds_fallback(records.len(), new_key_count) {
            break;
        }

        let old_child = old_children.get(key);
        if old_child == Some(new_child) {
            continue;
        }

        let child_path: Vec<String> = path.iter().cloned().chain([key.clone()]).collect();

        let both_maps = new_child.is_map() && old_child.is_some_and(Value::is_map);
        if both_maps {
            records.extend(find_changes(
                new_child,
                old_child.unwrap_or(&Value::Null),
                &child_path,
            ));
        } else {
            records.push(ChangeRecord::set(child_path, new_child.clone()));
        }
    }

    for key in old_children.keys() {
        if exceeds_fallback(records.len(), new_key_count) {
            break;
        }

        if !new_children.contains_key(key) {
            let child_path: Vec<String> = path.iter().cloned().chain([key.clone()]).collect();
            records.push(ChangeRecord::remove(child_path));
        }
    }

    if exceeds_fallback(records.len(), new_key_count) {
        return vec![ChangeRecord::set(path.to_vec(), new.clone())];
    }

    records
}

/// Computes the versioned update batch between two full state trees for the
/// given synchronized keys.
///
/// The version for each key is read from the new state's version map; keys
/// exempt from versioning must not be passed here (their changes travel
/// only via full-payload resync).
pub fn find_versioned_changes(new_state: &Value, old_state: &Value, keys: &[String]) -> UpdateBatch {
    let versions = versions_of(new_state);
    let mut updates = Vec::new();

    for key in keys {
        let new_value = new_state.get(key).unwrap_or(&Value::Null);
        let old_value = old_state.get(key).unwrap_or(&Value::Null);

        let changes = find_changes(new_value, old_value, &[]);
        if !changes.is_empty() {
            let version = versions.get(key).copied().unwrap_or(0);
            updates.push(VersionedUpdate::new(key.clone(), version, changes));
        }
    }

    updates
}
