//! Wire messages for the sync protocol.
//!
//! The envelope mirrors the action-dispatch shape of the wire format:
//! snapshot and update messages travel as `dispatchAction` envelopes whose
//! inner payload names the sync action, while the version-check request is
//! its own top-level type.

use crate::change::{UpdateBatch, VersionedUpdate};
use crate::error::{ProtocolError, ProtocolResult};
use crate::snapshot::InitialSyncPayload;
use crate::version::{versions_to_value, VersionMap};
use statebus_state::{from_cbor, to_cbor, Value, VERSIONS_KEY};

const TYPE_DISPATCH_ACTION: &str = "dispatchAction";
const TYPE_CHECK_VERSION: &str = "checkVersion";
const ACTION_INITIAL_STATE: &str = "initialSyncedState";
const ACTION_UPDATE_STATE: &str = "updateSyncedState";

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Version-check request carrying the sender's known versions.
    CheckVersion {
        /// The sender's committed version map.
        versions: VersionMap,
    },
    /// Full-value snapshot from the authoritative side.
    InitialState(InitialSyncPayload),
    /// Incremental versioned update batch.
    UpdateState(UpdateBatch),
    /// An application action forwarded to the peer for dispatch there.
    RemoteAction {
        /// The action name, as the receiving store knows it.
        name: String,
        /// The action payload.
        payload: Value,
    },
}

impl SyncMessage {
    /// Returns the wire type tag of this message.
    pub fn type_tag(&self) -> &'static str {
        match self {
            SyncMessage::CheckVersion { .. } => TYPE_CHECK_VERSION,
            SyncMessage::InitialState(_)
            | SyncMessage::UpdateState(_)
            | SyncMessage::RemoteAction { .. } => TYPE_DISPATCH_ACTION,
        }
    }

    /// Encodes to a wire value.
    pub fn to_value(&self) -> Value {
        match self {
            SyncMessage::CheckVersion { versions } => Value::map(vec![
                ("type", Value::from(TYPE_CHECK_VERSION)),
                (
                    "payload",
                    Value::map(vec![(VERSIONS_KEY, versions_to_value(versions))]),
                ),
            ]),
            SyncMessage::InitialState(payload) => {
                dispatch_action(ACTION_INITIAL_STATE, payload.to_value())
            }
            SyncMessage::UpdateState(batch) => dispatch_action(
                ACTION_UPDATE_STATE,
                Value::Array(batch.iter().map(VersionedUpdate::to_value).collect()),
            ),
            SyncMessage::RemoteAction { name, payload } => Value::map(vec![
                ("type", Value::from(TYPE_DISPATCH_ACTION)),
                (
                    "payload",
                    Value::map(vec![
                        ("type", Value::from(name.as_str())),
                        ("payload", payload.clone()),
                    ]),
                ),
            ]),
        }
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let message_type = value
            .get("type")
            .and_then(Value::as_text)
            .ok_or_else(|| ProtocolError::malformed("message missing type"))?;

        match message_type {
            TYPE_CHECK_VERSION => {
                let versions = value
                    .get("payload")
                    .and_then(|p| p.get(VERSIONS_KEY))
                    .and_then(Value::as_map)
                    .map(|map| {
                        map.iter()
                            .filter_map(|(key, v)| {
                                v.as_integer()
                                    .and_then(|n| u64::try_from(n).ok())
                                    .map(|version| (key.clone(), version))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(SyncMessage::CheckVersion { versions })
            }
            TYPE_DISPATCH_ACTION => {
                let action = value
                    .get("payload")
                    .ok_or_else(|| ProtocolError::malformed("dispatch missing payload"))?;
                let action_type = action
                    .get("type")
                    .and_then(Value::as_text)
                    .ok_or_else(|| ProtocolError::malformed("action missing type"))?;
                let inner = action
                    .get("payload")
                    .ok_or_else(|| ProtocolError::malformed("action missing payload"))?;

                match action_type {
                    ACTION_INITIAL_STATE => Ok(SyncMessage::InitialState(
                        InitialSyncPayload::from_value(inner)?,
                    )),
                    ACTION_UPDATE_STATE => {
                        let batch = inner
                            .as_array()
                            .ok_or_else(|| ProtocolError::malformed("update batch not an array"))?
                            .iter()
                            .map(VersionedUpdate::from_value)
                            .collect::<ProtocolResult<UpdateBatch>>()?;
                        Ok(SyncMessage::UpdateState(batch))
                    }
                    // Anything else is an application action forwarded for
                    // dispatch on this side.
                    other => Ok(SyncMessage::RemoteAction {
                        name: other.to_string(),
                        payload: inner.clone(),
                    }),
                }
            }
            other => Err(ProtocolError::UnknownMessageType(other.to_string())),
        }
    }

    /// Encodes to CBOR bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(to_cbor(&self.to_value())?)
    }

    /// Decodes from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

fn dispatch_action(action_type: &str, payload: Value) -> Value {
    Value::map(vec![
        ("type", Value::from(TYPE_DISPATCH_ACTION)),
        (
            "payload",
            Value::map(vec![
                ("type", Value::from(action_type)),
                ("meta", Value::map(vec![("toClient", Value::Bool(true))])),
                ("payload", payload),
            ]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeRecord;

    #[test]
    fn check_version_roundtrip() {
        let mut versions = VersionMap::new();
        versions.insert("count".into(), 3);
        versions.insert("profile".into(), 1);

        let message = SyncMessage::CheckVersion { versions };
        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn check_version_empty_versions() {
        let message = SyncMessage::CheckVersion {
            versions: VersionMap::new(),
        };
        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn initial_state_roundtrip() {
        let mut payload = InitialSyncPayload::default();
        payload.versions.insert("profile".into(), 3);
        payload
            .state
            .insert("profile".into(), Value::map(vec![("name", Value::from("x"))]));

        let message = SyncMessage::InitialState(payload);
        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn update_state_roundtrip() {
        let batch = vec![VersionedUpdate::new(
            "count",
            1,
            vec![ChangeRecord::set(vec![], Value::Integer(1))],
        )];

        let message = SyncMessage::UpdateState(batch);
        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn type_tags() {
        assert_eq!(
            SyncMessage::CheckVersion {
                versions: VersionMap::new()
            }
            .type_tag(),
            "checkVersion"
        );
        assert_eq!(
            SyncMessage::UpdateState(vec![]).type_tag(),
            "dispatchAction"
        );
    }

    #[test]
    fn unknown_type_rejected() {
        let value = Value::map(vec![("type", Value::from("ping"))]);
        assert!(matches!(
            SyncMessage::from_value(&value),
            Err(ProtocolError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn other_actions_decode_as_remote() {
        let message = SyncMessage::RemoteAction {
            name: "increment".into(),
            payload: Value::Integer(2),
        };
        let decoded = SyncMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn missing_type_rejected() {
        let value = Value::map(vec![("payload", Value::Null)]);
        assert!(matches!(
            SyncMessage::from_value(&value),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
