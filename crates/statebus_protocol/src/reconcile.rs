//! The reconciler: applies versioned update batches against current state.

use crate::change::{ChangeRecord, UpdateBatch};
use crate::version::{is_next_version, versions_of};
use statebus_state::{remove_path, set_path, Value, VERSIONS_KEY};
use tracing::debug;

/// Result of applying an update batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// The possibly-partially-updated state.
    pub state: Value,
    /// True when a version gap or duplicate was detected and a version
    /// check round trip should follow.
    pub should_resync: bool,
}

/// Applies a batch of versioned updates to `state`.
///
/// Updates for keys outside `keys` are ignored. Each remaining update is
/// accepted only when its version is exactly one greater than the committed
/// version for that key; otherwise its changes are discarded, the resync
/// flag is set, and processing continues with the next update. Updates that
/// pass the check are applied even when a later update in the same batch
/// fails it, so the returned state stays internally consistent.
pub fn apply_update_batch(state: &Value, batch: &UpdateBatch, keys: &[String]) -> ApplyOutcome {
    let mut current = state.clone();
    let mut should_resync = false;

    for update in batch {
        if !keys.contains(&update.key) {
            continue;
        }

        let committed = versions_of(&current);
        if !is_next_version(&committed, &update.key, update.version) {
            debug!(
                key = %update.key,
                received = update.version,
                committed = committed.get(&update.key).copied().unwrap_or(0),
                "version out of sequence, flagging resync"
            );
            should_resync = true;
            continue;
        }

        current = set_path(
            &current,
            &[VERSIONS_KEY, update.key.as_str()],
            Value::from(update.version),
        );

        for record in &update.changes {
            let full_path: Vec<String> = std::iter::once(update.key.clone())
                .chain(record.path().iter().cloned())
                .collect();

            current = match record {
                ChangeRecord::Set { value, .. } => set_path(&current, &full_path, value.clone()),
                ChangeRecord::Remove { .. } => remove_path(&current, &full_path),
            };
        }
    }

    ApplyOutcome {
        state: current,
        should_resync,
    }
}
