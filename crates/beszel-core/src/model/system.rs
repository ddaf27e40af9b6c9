// ── Monitored system domain type ──

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reachability of a system as reported by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SystemStatus {
    Up,
    Down,
    Paused,
    Pending,
    /// Any status string the hub may add later.
    Other(String),
}

impl SystemStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Paused => "paused",
            Self::Pending => "pending",
            Self::Other(s) => s,
        }
    }

    /// Only `up` counts as online.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

impl From<&str> for SystemStatus {
    fn from(s: &str) -> Self {
        match s {
            "up" => Self::Up,
            "down" => Self::Down,
            "paused" => Self::Paused,
            "pending" => Self::Pending,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for SystemStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<SystemStatus> for String {
    fn from(status: SystemStatus) -> Self {
        match status {
            SystemStatus::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static host details from the agent's `info` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDetails {
    pub hostname: Option<String>,
    pub kernel: Option<String>,
    pub cpu_cores: Option<u32>,
    pub cpu_threads: Option<u32>,
    pub cpu_model: Option<String>,
    pub agent_version: Option<String>,
    pub os: Option<String>,
}

/// One monitored system as of the latest successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub id: String,
    pub name: String,
    pub status: SystemStatus,
    pub host: Option<String>,
    pub port: Option<String>,
    /// Sensor key (`cpu`, `memory`, ...) to value, rounded to two decimals.
    pub metrics: IndexMap<String, f64>,
    pub details: SystemDetails,
    pub updated: Option<DateTime<Utc>>,
    /// Set when the detail request failed and the list record was used.
    pub error: Option<String>,
}

impl SystemSnapshot {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_and_unknown_strings() {
        assert_eq!(SystemStatus::from("up"), SystemStatus::Up);
        assert_eq!(SystemStatus::from("down"), SystemStatus::Down);
        assert_eq!(
            SystemStatus::from("rebooting"),
            SystemStatus::Other("rebooting".into())
        );
        assert!(SystemStatus::Up.is_up());
        assert!(!SystemStatus::Paused.is_up());
        assert!(!SystemStatus::from("UP").is_up());
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_string(&SystemStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: SystemStatus = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(back.to_string(), "weird");
    }
}
