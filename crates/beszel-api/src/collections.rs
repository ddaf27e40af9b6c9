// Hub collection endpoints
//
// Systems, container stats, and collection discovery. Each method is a
// thin typed wrapper over the generic record helpers in `client.rs`.

use serde_json::Value;
use tracing::debug;

use crate::client::{BeszelClient, ListQuery};
use crate::error::Error;
use crate::models::{CollectionInfo, ContainerStatsRecord, ListResult, SystemRecord};

pub const SYSTEMS: &str = "systems";
pub const CONTAINER_STATS: &str = "container_stats";

/// Collections probed when the hub has no `container_stats` collection.
pub const CONTAINER_FALLBACK_COLLECTIONS: &[&str] =
    &["stats", "containers", "docker", "docker_stats", "system_stats"];

const SYSTEMS_PAGE_SIZE: u32 = 200;
const CONTAINER_STATS_PAGE_SIZE: u32 = 100;

impl BeszelClient {
    /// List every monitored system.
    ///
    /// `GET /api/collections/systems/records`
    pub async fn list_systems(&self) -> Result<Vec<SystemRecord>, Error> {
        debug!("listing systems");
        self.list_all(SYSTEMS, ListQuery::new(SYSTEMS_PAGE_SIZE))
            .await
    }

    /// Fetch the current record of one system.
    ///
    /// `GET /api/collections/systems/records/{id}`
    pub async fn get_system(&self, id: &str) -> Result<SystemRecord, Error> {
        debug!(system_id = id, "fetching system detail");
        self.get_record(SYSTEMS, id).await
    }

    /// Most recent container stats rows, newest first.
    ///
    /// `GET /api/collections/container_stats/records?sort=-created&perPage=100&expand=system`
    ///
    /// Returns [`Error::CollectionNotFound`] on hubs without the collection;
    /// see [`list_fallback_records`](Self::list_fallback_records).
    pub async fn list_container_stats(&self) -> Result<Vec<ContainerStatsRecord>, Error> {
        debug!("listing container stats");
        let query = ListQuery::new(CONTAINER_STATS_PAGE_SIZE)
            .sort("-created")
            .expand("system");
        let page: ListResult<ContainerStatsRecord> =
            self.list_page(CONTAINER_STATS, &query).await?;
        Ok(page.items)
    }

    /// Recent rows from each fallback collection that exists on the hub.
    ///
    /// Missing collections and per-collection errors are skipped; the
    /// result pairs each collection name with its raw items.
    pub async fn list_fallback_records(&self) -> Vec<(String, Vec<Value>)> {
        let mut found = Vec::new();
        for &name in CONTAINER_FALLBACK_COLLECTIONS {
            let query = ListQuery::new(CONTAINER_STATS_PAGE_SIZE).sort("-created");
            match self.list_page::<Value>(name, &query).await {
                Ok(page) if !page.items.is_empty() => {
                    debug!(collection = name, items = page.items.len(), "fallback collection found");
                    found.push((name.to_owned(), page.items));
                }
                Ok(_) => debug!(collection = name, "fallback collection empty"),
                Err(e) if e.is_not_found() => debug!(collection = name, "collection not found"),
                Err(e) => debug!(collection = name, error = %e, "error probing collection"),
            }
        }
        found
    }

    /// Enumerate collections for diagnostics.
    ///
    /// Tries `GET /api/collections` first (superusers only). When that is
    /// refused, probes well-known container collections by name.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, Error> {
        let url = self.base_url().join("/api/collections")?;
        let resp = self.get_authorized(url).await?;

        if resp.status().is_success() {
            let body: Value = resp.json().await?;
            let items = match body {
                Value::Array(items) => items,
                Value::Object(mut obj) => match obj.remove("items") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            let names = items
                .iter()
                .filter_map(|c| c.get("name").and_then(Value::as_str))
                .map(|name| CollectionInfo {
                    name: name.to_owned(),
                    count: None,
                })
                .collect();
            return Ok(names);
        }

        debug!(status = %resp.status(), "collection listing refused, probing by name");
        let mut found = Vec::new();
        for name in [CONTAINER_STATS, "containers", "docker_stats", "docker_containers"] {
            match self.list_page::<Value>(name, &ListQuery::new(1)).await {
                Ok(page) => found.push(CollectionInfo {
                    name: name.to_owned(),
                    count: Some(usize::try_from(page.total_items).unwrap_or(page.items.len())),
                }),
                Err(e) if e.is_auth_expired() => return Err(e),
                Err(e) => debug!(collection = name, error = %e, "probe failed"),
            }
        }
        Ok(found)
    }

    /// Verify credentials and read access to the systems collection.
    ///
    /// Always performs a fresh login. Returns the number of systems the
    /// account can see.
    pub async fn check_connection(&self) -> Result<usize, Error> {
        self.authenticate().await?;
        let page: ListResult<SystemRecord> =
            self.list_page(SYSTEMS, &ListQuery::new(1)).await?;
        let count = usize::try_from(page.total_items).unwrap_or(page.items.len());
        debug!(systems = count, "connection check passed");
        Ok(count)
    }
}
