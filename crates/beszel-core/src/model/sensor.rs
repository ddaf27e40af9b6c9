// ── Sensor tables ──
//
// Static lookup from Beszel's abbreviated JSON field names to the typed
// gauges exposed to hosts. The mapper and the entity projection both read
// from these tables, so adding a row here is all a new metric needs.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

/// Semantic class of an entity, in the vocabulary home-automation hosts use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Duration,
    DataRate,
    DataSize,
    Connectivity,
    Running,
}

/// One row of a sensor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSpec {
    /// Stable key, used in entity unique ids and snapshot metric maps.
    pub key: &'static str,
    /// JSON field the value is read from.
    pub field: &'static str,
    /// Human label appended to the owner's name.
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
}

/// Gauges read from a system record's `info` object.
pub const SYSTEM_SENSORS: &[SensorSpec] = &[
    SensorSpec {
        key: "cpu",
        field: "cpu",
        label: "CPU Usage",
        unit: Some("%"),
        device_class: None,
    },
    SensorSpec {
        key: "memory",
        field: "mp",
        label: "Memory Usage",
        unit: Some("%"),
        device_class: None,
    },
    SensorSpec {
        key: "disk",
        field: "dp",
        label: "Disk Usage",
        unit: Some("%"),
        device_class: None,
    },
    SensorSpec {
        key: "disk_temp",
        field: "dt",
        label: "Disk Temperature",
        unit: Some("°C"),
        device_class: Some(DeviceClass::Temperature),
    },
    SensorSpec {
        key: "uptime",
        field: "u",
        label: "Uptime",
        unit: Some("s"),
        device_class: Some(DeviceClass::Duration),
    },
    SensorSpec {
        key: "bandwidth",
        field: "b",
        label: "Bandwidth",
        unit: Some("MB/s"),
        device_class: Some(DeviceClass::DataRate),
    },
];

/// Gauges read from each item of a container stats record.
pub const CONTAINER_SENSORS: &[SensorSpec] = &[
    SensorSpec {
        key: "docker_cpu",
        field: "c",
        label: "CPU Usage",
        unit: Some("%"),
        device_class: None,
    },
    SensorSpec {
        key: "docker_memory",
        field: "m",
        label: "Memory Usage",
        unit: Some("MB"),
        device_class: Some(DeviceClass::DataSize),
    },
    SensorSpec {
        key: "docker_network_tx",
        field: "ns",
        label: "Network TX",
        unit: Some("MB/s"),
        device_class: Some(DeviceClass::DataRate),
    },
    SensorSpec {
        key: "docker_network_rx",
        field: "nr",
        label: "Network RX",
        unit: Some("MB/s"),
        device_class: Some(DeviceClass::DataRate),
    },
];

/// Look up a system sensor by key.
pub fn system_sensor(key: &str) -> Option<&'static SensorSpec> {
    SYSTEM_SENSORS.iter().find(|s| s.key == key)
}
