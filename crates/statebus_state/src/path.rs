//! Path operations on state trees.
//!
//! Paths are ordered lists of string segments addressing a position in a
//! nested map. Writes create intermediate maps as needed; removals of
//! missing paths are no-ops.

use crate::value::Value;

/// Looks up the value at `path`, if the whole path exists.
pub fn get_path<'a>(value: &'a Value, path: &[impl AsRef<str>]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment.as_ref())?;
    }
    Some(current)
}

/// Returns a copy of `value` with `new` written at `path`.
///
/// Intermediate segments that are missing or not maps are replaced with
/// maps. An empty path replaces the whole value.
pub fn set_path(value: &Value, path: &[impl AsRef<str>], new: Value) -> Value {
    let Some((head, rest)) = path.split_first() else {
        return new;
    };

    let mut map = match value {
        Value::Map(m) => m.clone(),
        _ => Default::default(),
    };

    let child = map.get(head.as_ref()).cloned().unwrap_or(Value::Null);
    map.insert(head.as_ref().to_string(), set_path(&child, rest, new));
    Value::Map(map)
}

/// Returns a copy of `value` with the entry at `path` removed.
///
/// If any segment along the path is missing, the value is returned
/// unchanged. An empty path yields an empty map.
pub fn remove_path(value: &Value, path: &[impl AsRef<str>]) -> Value {
    let Some((head, rest)) = path.split_first() else {
        return Value::empty_map();
    };

    let Value::Map(map) = value else {
        return value.clone();
    };

    let mut map = map.clone();
    if rest.is_empty() {
        map.remove(head.as_ref());
    } else if let Some(child) = map.get(head.as_ref()) {
        let pruned = remove_path(child, rest);
        map.insert(head.as_ref().to_string(), pruned);
    }
    Value::Map(map)
}
