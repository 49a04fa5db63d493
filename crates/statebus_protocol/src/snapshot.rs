//! Resync snapshots: full-value payloads that heal gaps and bootstrap
//! newly connected peers.

use crate::error::{ProtocolError, ProtocolResult};
use crate::version::{versions_of, versions_to_value, VersionMap};
use statebus_state::{Value, VERSIONS_KEY};
use std::collections::BTreeMap;

/// A full-value snapshot for keys whose version the peer does not have or
/// does not match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitialSyncPayload {
    /// Current versions for the included keys.
    pub versions: VersionMap,
    /// Current full values for the included keys.
    pub state: BTreeMap<String, Value>,
}

impl InitialSyncPayload {
    /// Returns true when the payload carries nothing.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.state.is_empty()
    }

    /// Encodes to a wire value: `{versions, state}`.
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            (VERSIONS_KEY, versions_to_value(&self.versions)),
            ("state", Value::Map(self.state.clone())),
        ])
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let versions = value
            .get(VERSIONS_KEY)
            .map(versions_wire)
            .transpose()?
            .unwrap_or_default();

        let state = value
            .get("state")
            .and_then(Value::as_map)
            .cloned()
            .ok_or_else(|| ProtocolError::malformed("snapshot missing state"))?;

        Ok(Self { versions, state })
    }
}

fn versions_wire(value: &Value) -> ProtocolResult<VersionMap> {
    let map = value
        .as_map()
        .ok_or_else(|| ProtocolError::malformed("versions is not a map"))?;

    map.iter()
        .map(|(key, version)| {
            version
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .map(|v| (key.clone(), v))
                .ok_or_else(|| ProtocolError::malformed("non-integer version"))
        })
        .collect()
}

/// Computes the snapshot an authoritative peer should send in answer to a
/// version check.
///
/// Includes every locally tracked versioned key whose version differs from
/// the peer's claim, plus every key whose peer claim is exactly 0 (the peer
/// has never synced it). Keys exempt from versioning are always included in
/// full, since they carry no version to compare. Returns `None` when there
/// is nothing to send.
pub fn collect_new_versions(
    state: &Value,
    peer_versions: &VersionMap,
    skip_version: &[String],
) -> Option<InitialSyncPayload> {
    let local_versions = versions_of(state);
    let mut payload = InitialSyncPayload::default();

    for (key, local_version) in &local_versions {
        let claimed = peer_versions.get(key).copied();
        if claimed != Some(*local_version) || claimed == Some(0) {
            payload.versions.insert(key.clone(), *local_version);
            payload.state.insert(
                key.clone(),
                state.get(key).cloned().unwrap_or(Value::Null),
            );
        }
    }

    for key in skip_version {
        payload
            .state
            .insert(key.clone(), state.get(key).cloned().unwrap_or(Value::Null));
    }

    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Merges a snapshot into local state unconditionally; the sending peer is
/// authoritative for the included keys.
///
/// Top-level values are replaced wholesale and the version map entries are
/// merged over the local ones. Applying the same snapshot twice yields the
/// same state as applying it once.
pub fn merge_snapshot(state: &Value, payload: &InitialSyncPayload) -> Value {
    let mut map = match state {
        Value::Map(m) => m.clone(),
        _ => BTreeMap::new(),
    };

    for (key, value) in &payload.state {
        map.insert(key.clone(), value.clone());
    }

    let mut versions = versions_of(state);
    for (key, version) in &payload.versions {
        versions.insert(key.clone(), *version);
    }
    if !versions.is_empty() {
        map.insert(VERSIONS_KEY.to_string(), versions_to_value(&versions));
    }

    Value::Map(map)
}
