// beszel-api: Async Rust client for the Beszel hub (PocketBase) HTTP API

pub mod auth;
pub mod client;
pub mod collections;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{Credentials, Session};
pub use client::{BeszelClient, ListQuery, hub_url};
pub use error::Error;
pub use models::{CollectionInfo, ContainerStatsRecord, ListResult, SystemRecord};
pub use transport::{TlsMode, TransportConfig};
