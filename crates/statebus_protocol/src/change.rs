//! Change records: the unit of structural difference.

use crate::error::{ProtocolError, ProtocolResult};
use statebus_state::Value;

/// One leaf-level difference between two state trees.
///
/// Exactly one of the two variants applies at a path: the value was set
/// (or replaced), or it was removed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    /// The value at `path` was set or replaced.
    Set {
        /// Ordered path segments from the diff root.
        path: Vec<String>,
        /// The new value at that path.
        value: Value,
    },
    /// The value at `path` was removed.
    Remove {
        /// Ordered path segments from the diff root.
        path: Vec<String>,
    },
}

impl ChangeRecord {
    /// Creates a set record.
    pub fn set(path: Vec<String>, value: Value) -> Self {
        ChangeRecord::Set { path, value }
    }

    /// Creates a remove record.
    pub fn remove(path: Vec<String>) -> Self {
        ChangeRecord::Remove { path }
    }

    /// Returns the path of this record.
    pub fn path(&self) -> &[String] {
        match self {
            ChangeRecord::Set { path, .. } | ChangeRecord::Remove { path } => path,
        }
    }

    /// Encodes to a wire value: `{path, value}` or `{path, removed: true}`.
    pub fn to_value(&self) -> Value {
        let path_value = |path: &[String]| {
            Value::Array(path.iter().map(|s| Value::Text(s.clone())).collect())
        };
        match self {
            ChangeRecord::Set { path, value } => Value::map(vec![
                ("path", path_value(path)),
                ("value", value.clone()),
            ]),
            ChangeRecord::Remove { path } => Value::map(vec![
                ("path", path_value(path)),
                ("removed", Value::Bool(true)),
            ]),
        }
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let path = value
            .get("path")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::malformed("change record missing path"))?
            .iter()
            .map(|segment| {
                segment
                    .as_text()
                    .map(str::to_string)
                    .ok_or_else(|| ProtocolError::malformed("non-text path segment"))
            })
            .collect::<ProtocolResult<Vec<String>>>()?;

        if value.get("removed").and_then(Value::as_bool) == Some(true) {
            return Ok(ChangeRecord::Remove { path });
        }

        let new = value
            .get("value")
            .cloned()
            .ok_or_else(|| ProtocolError::malformed("change record missing value"))?;
        Ok(ChangeRecord::Set { path, value: new })
    }
}

/// An ordered list of change records for one synchronized key, produced by
/// one diff pass.
pub type ChangeSet = Vec<ChangeRecord>;

/// One key's change set tagged with the version it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedUpdate {
    /// The synchronized key.
    pub key: String,
    /// The version this change set produces.
    pub version: u64,
    /// The change set.
    pub changes: ChangeSet,
}

impl VersionedUpdate {
    /// Creates a new versioned update.
    pub fn new(key: impl Into<String>, version: u64, changes: ChangeSet) -> Self {
        Self {
            key: key.into(),
            version,
            changes,
        }
    }

    /// Encodes to a wire value.
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            ("key", Value::from(self.key.as_str())),
            ("version", Value::from(self.version)),
            (
                "changes",
                Value::Array(self.changes.iter().map(ChangeRecord::to_value).collect()),
            ),
        ])
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let key = value
            .get("key")
            .and_then(Value::as_text)
            .ok_or_else(|| ProtocolError::malformed("update missing key"))?
            .to_string();

        let version = value
            .get("version")
            .and_then(Value::as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| ProtocolError::malformed("update missing version"))?;

        let changes = value
            .get("changes")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::malformed("update missing changes"))?
            .iter()
            .map(ChangeRecord::from_value)
            .collect::<ProtocolResult<ChangeSet>>()?;

        Ok(Self {
            key,
            version,
            changes,
        })
    }
}

/// An ordered list of versioned updates, the unit transmitted for
/// incremental sync.
pub type UpdateBatch = Vec<VersionedUpdate>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_record_roundtrip() {
        let record = ChangeRecord::set(
            vec!["user".into(), "name".into()],
            Value::from("Alice"),
        );

        let decoded = ChangeRecord::from_value(&record.to_value()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn remove_record_roundtrip() {
        let record = ChangeRecord::remove(vec!["user".into(), "age".into()]);
        let decoded = ChangeRecord::from_value(&record.to_value()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn set_null_is_not_remove() {
        // Setting a key to null is an ordinary value change.
        let record = ChangeRecord::set(vec!["a".into()], Value::Null);
        let decoded = ChangeRecord::from_value(&record.to_value()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn malformed_record_rejected() {
        let no_path = Value::map(vec![("value", Value::Integer(1))]);
        assert!(ChangeRecord::from_value(&no_path).is_err());

        let no_value = Value::map(vec![("path", Value::Array(vec![]))]);
        assert!(ChangeRecord::from_value(&no_value).is_err());
    }

    #[test]
    fn versioned_update_roundtrip() {
        let update = VersionedUpdate::new(
            "count",
            3,
            vec![ChangeRecord::set(vec![], Value::Integer(7))],
        );

        let decoded = VersionedUpdate::from_value(&update.to_value()).unwrap();
        assert_eq!(decoded, update);
    }
}
