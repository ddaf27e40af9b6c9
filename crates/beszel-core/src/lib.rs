//! Polling layer between `beszel-api` and hosts (the CLI, or a
//! home-automation runtime).
//!
//! - **[`Coordinator`]**: owns one hub connection. [`start()`](Coordinator::start)
//!   spawns a timer-driven poll task with at-most-one cycle in flight and
//!   exponential backoff after transient failures;
//!   [`Coordinator::oneshot()`] runs a single cycle for CLI invocations.
//!
//! - **[`Poller`]**: runs one cycle. Lists systems, fetches details concurrently,
//!   fetches container stats, then hands the raw records to the [`mapper`].
//!
//! - **[`SnapshotStore`]**: latest [`SnapshotSet`] behind a `watch` channel,
//!   plus the add/remove [`SnapshotDiff`] of entity ids per cycle. A failed
//!   cycle never touches it, so hosts keep serving stale-but-available data.
//!
//! - **Domain model** ([`model`]) and [`entities`]: typed snapshots, the
//!   static sensor tables, and the gauge / on-off projection hosts register.

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod mapper;
pub mod model;
pub mod poller;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::Backoff;
pub use config::{BackoffPolicy, MonitorConfig, TlsVerification};
pub use coordinator::{Coordinator, MonitorState, RefreshOutcome};
pub use entities::{Entity, EntityState, entities, entity_ids};
pub use error::{CoreError, PollError};
pub use poller::Poller;
pub use store::{SnapshotDiff, SnapshotStore};

pub use model::{
    ContainerSnapshot, DeviceClass, SensorSpec, SnapshotSet, SystemDetails, SystemSnapshot,
    SystemStatus,
};
