// ── Snapshot store ──
//
// Holds the most recent successful `SnapshotSet` and publishes it through
// a `watch` channel. Each apply computes the flat add/remove diff of
// entity ids so hosts can register or drop entities.

use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::entities::entity_ids;
use crate::model::SnapshotSet;

const DIFF_CHANNEL_SIZE: usize = 32;

/// Entity ids that appeared or disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Diff two ordered id sets; output keeps the order of each side.
    pub fn between(previous: &IndexSet<String>, next: &IndexSet<String>) -> Self {
        Self {
            added: next.difference(previous).cloned().collect(),
            removed: previous.difference(next).cloned().collect(),
        }
    }
}

/// Latest-snapshot holder with push-based change notification.
pub struct SnapshotStore {
    snapshot: watch::Sender<Option<Arc<SnapshotSet>>>,
    diffs: broadcast::Sender<Arc<SnapshotDiff>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(None);
        let (diffs, _) = broadcast::channel(DIFF_CHANNEL_SIZE);
        Self { snapshot, diffs }
    }

    /// Replace the stored snapshot and return the entity id diff.
    ///
    /// The diff is also broadcast to subscribers when non-empty.
    pub fn apply(&self, next: SnapshotSet) -> SnapshotDiff {
        let previous_ids: IndexSet<String> = self
            .snapshot
            .borrow()
            .as_deref()
            .map(entity_ids)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let next_ids: IndexSet<String> = entity_ids(&next).into_iter().collect();
        let diff = SnapshotDiff::between(&previous_ids, &next_ids);

        debug!(
            systems = next.systems.len(),
            containers = next.containers.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "snapshot applied"
        );

        self.snapshot.send_replace(Some(Arc::new(next)));
        if !diff.is_empty() {
            // No receivers is fine.
            let _ = self.diffs.send(Arc::new(diff.clone()));
        }
        diff
    }

    /// The latest snapshot, or `None` before the first successful poll.
    pub fn current(&self) -> Option<Arc<SnapshotSet>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SnapshotSet>>> {
        self.snapshot.subscribe()
    }

    /// Subscribe to non-empty entity diffs.
    pub fn subscribe_diffs(&self) -> broadcast::Receiver<Arc<SnapshotDiff>> {
        self.diffs.subscribe()
    }
}
