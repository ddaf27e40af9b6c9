// ── Docker container domain type ──

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One container on a monitored system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// `"{system_name}_{container_name}"`, unique across the hub.
    pub key: String,
    pub name: String,
    pub system_id: String,
    pub system_name: String,
    /// Sensor key (`docker_cpu`, ...) to value, rounded to two decimals.
    pub metrics: IndexMap<String, f64>,
    /// Whether the container was reported running in the latest record.
    pub running: bool,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl ContainerSnapshot {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Build the hub-wide container key.
pub fn container_key(system_name: &str, container_name: &str) -> String {
    format!("{system_name}_{container_name}")
}
