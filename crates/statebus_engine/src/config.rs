//! Synchronization configuration.

use crate::error::{SyncError, SyncResult};
use statebus_state::VERSIONS_KEY;

/// Configuration for one synchronized store.
///
/// `keys` is the allow-list of top-level state keys that participate in
/// synchronization; everything else stays local. Keys in `skip_version`
/// are synchronized without version tracking and travel only in full
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    keys: Vec<String>,
    skip_version: Vec<String>,
    wait_for_action: Option<String>,
}

impl SyncConfig {
    /// Creates a config synchronizing the given top-level keys.
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            skip_version: Vec::new(),
            wait_for_action: None,
        }
    }

    /// Exempts keys from version tracking. Must be a subset of `keys`.
    pub fn with_skip_version(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skip_version = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Holds the first version check until this action has been
    /// dispatched (local state rehydration).
    pub fn with_wait_for_action(mut self, action: impl Into<String>) -> Self {
        self.wait_for_action = Some(action.into());
        self
    }

    /// Validates the config.
    pub fn validate(&self) -> SyncResult<()> {
        if self.keys.is_empty() {
            return Err(SyncError::config("no synchronized keys"));
        }
        if self.keys.iter().any(|key| key == VERSIONS_KEY) {
            return Err(SyncError::config(format!(
                "\"{VERSIONS_KEY}\" is reserved and may not be synchronized"
            )));
        }
        for key in &self.skip_version {
            if !self.keys.contains(key) {
                return Err(SyncError::config(format!(
                    "skip_version key \"{key}\" is not in the synchronized key set"
                )));
            }
        }
        Ok(())
    }

    /// The synchronized top-level keys.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Keys exempt from version tracking.
    pub fn skip_version(&self) -> &[String] {
        &self.skip_version
    }

    /// Synchronized keys that carry versions.
    pub fn versioned_keys(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|key| !self.skip_version.contains(key))
            .cloned()
            .collect()
    }

    /// The action that completes rehydration, if gating is enabled.
    pub fn wait_for_action(&self) -> Option<&str> {
        self.wait_for_action.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let config = SyncConfig::new(["count", "session"])
            .with_skip_version(["session"])
            .with_wait_for_action("rehydrated");
        assert!(config.validate().is_ok());
        assert_eq!(config.versioned_keys(), vec!["count".to_string()]);
        assert_eq!(config.wait_for_action(), Some("rehydrated"));
    }

    #[test]
    fn empty_keys_rejected() {
        let config = SyncConfig::new(Vec::<String>::new());
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn versions_key_rejected() {
        let config = SyncConfig::new(["count", VERSIONS_KEY]);
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn skip_version_must_be_subset() {
        let config = SyncConfig::new(["count"]).with_skip_version(["session"]);
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }
}
