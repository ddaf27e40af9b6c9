// ── Domain model ──
//
// Typed snapshots produced by the mapper and consumed by hosts.

pub mod container;
pub mod sensor;
pub mod snapshot;
pub mod system;

pub use container::{ContainerSnapshot, container_key};
pub use sensor::{CONTAINER_SENSORS, DeviceClass, SYSTEM_SENSORS, SensorSpec};
pub use snapshot::SnapshotSet;
pub use system::{SystemDetails, SystemSnapshot, SystemStatus};
