// ── Single poll cycle ──
//
// One list request, concurrent per-system detail requests, and the
// optional container stats fetch, mapped into a `SnapshotSet`.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use beszel_api::{BeszelClient, SystemRecord};

use crate::error::PollError;
use crate::mapper::{self, RawContainers, RawPoll, RawSystem};
use crate::model::SnapshotSet;

/// Fetches and maps one cycle's worth of hub data.
pub struct Poller {
    client: Arc<BeszelClient>,
    include_docker: bool,
}

impl Poller {
    pub fn new(client: Arc<BeszelClient>, include_docker: bool) -> Self {
        Self {
            client,
            include_docker,
        }
    }

    pub fn client(&self) -> &Arc<BeszelClient> {
        &self.client
    }

    /// Run one cycle.
    ///
    /// `previous` supplies the container set to keep when the container
    /// fetch fails; a container failure never fails the cycle.
    pub async fn poll(&self, previous: Option<&SnapshotSet>) -> Result<SnapshotSet, PollError> {
        let records = self.client.list_systems().await?;
        debug!(systems = records.len(), "listed systems");

        let systems = self.fetch_details(records).await?;

        let (containers, containers_failed) = if self.include_docker {
            match self.fetch_containers().await {
                Ok(raw) => (raw, false),
                Err(e) => {
                    warn!(error = %e, "container fetch failed, keeping previous containers");
                    (RawContainers::Disabled, true)
                }
            }
        } else {
            (RawContainers::Disabled, false)
        };

        let raw = RawPoll {
            systems,
            containers,
            fetched_at: Utc::now(),
        };
        let mut snapshot = mapper::map(&raw);

        if let Some(prev) = previous.filter(|_| containers_failed) {
            snapshot.containers.clone_from(&prev.containers);
        }

        Ok(snapshot)
    }

    /// Fetch each system's detail record concurrently.
    ///
    /// A failed detail request falls back to the list record, except for
    /// authentication failures, which fail the cycle.
    async fn fetch_details(&self, records: Vec<SystemRecord>) -> Result<Vec<RawSystem>, PollError> {
        let details = join_all(records.iter().map(|r| self.client.get_system(&r.id))).await;

        let mut systems = Vec::with_capacity(records.len());
        for (record, detail) in records.into_iter().zip(details) {
            match detail {
                Ok(detail) => systems.push(RawSystem {
                    record: detail,
                    detail_error: None,
                }),
                Err(e) if e.is_auth_expired() => return Err(e.into()),
                Err(e) => {
                    warn!(system_id = %record.id, error = %e, "system detail failed, using list record");
                    systems.push(RawSystem {
                        record,
                        detail_error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(systems)
    }

    async fn fetch_containers(&self) -> Result<RawContainers, PollError> {
        match self.client.list_container_stats().await {
            Ok(rows) => {
                debug!(rows = rows.len(), "fetched container stats");
                Ok(RawContainers::Stats(rows))
            }
            Err(e) if e.is_not_found() => {
                info!("container_stats collection not found, probing fallback collections");
                let found = self.client.list_fallback_records().await;
                Ok(RawContainers::Fallback(found))
            }
            Err(e) => Err(e.into()),
        }
    }
}
