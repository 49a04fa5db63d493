//! Property-based test generators using proptest.

use proptest::prelude::*;
use statebus_protocol::VersionMap;
use statebus_state::Value;

/// Strategy for state map keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,5}"
}

/// Strategy for leaf values.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..1_000_000).prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
    ]
}

/// Strategy for arbitrarily nested value trees.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..6).prop_map(Value::Map),
        ]
    })
}

/// Strategy for map-rooted state trees, the shape stores hold.
pub fn state_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..6).prop_map(Value::Map)
}

/// Strategy for version maps.
pub fn version_map_strategy() -> impl Strategy<Value = VersionMap> {
    prop::collection::btree_map(key_strategy(), 0u64..100, 0..6)
}

/// Strategy for a state together with a structurally related mutation of
/// it, which exercises the diff more than two independent trees would.
pub fn state_pair_strategy() -> impl Strategy<Value = (Value, Value)> {
    (state_strategy(), state_strategy(), any::<bool>()).prop_map(|(base, other, overlay)| {
        if !overlay {
            return (base, other);
        }
        // Overlay some of the other tree's top-level keys onto the base.
        let mut merged = match &base {
            Value::Map(map) => map.clone(),
            _ => Default::default(),
        };
        if let Value::Map(map) = &other {
            for (key, value) in map.iter().take(2) {
                merged.insert(key.clone(), value.clone());
            }
        }
        (base, Value::Map(merged))
    })
}
