// ── Snapshot set ──
//
// The complete output of one successful poll cycle. Replaced wholesale;
// never mutated after publication.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::container::ContainerSnapshot;
use super::system::SystemSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSet {
    /// System id to snapshot, in hub order.
    pub systems: IndexMap<String, SystemSnapshot>,
    /// Container key to snapshot.
    pub containers: IndexMap<String, ContainerSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl SnapshotSet {
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            systems: IndexMap::new(),
            containers: IndexMap::new(),
            fetched_at,
        }
    }

    pub fn system(&self, id: &str) -> Option<&SystemSnapshot> {
        self.systems.get(id)
    }

    pub fn container(&self, key: &str) -> Option<&ContainerSnapshot> {
        self.containers.get(key)
    }

    pub fn systems_up(&self) -> usize {
        self.systems.values().filter(|s| s.is_up()).count()
    }
}
