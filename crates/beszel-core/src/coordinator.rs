// ── Poll coordinator ──
//
// Owns the API client, the poller, and the snapshot store for one hub.
// A single background task drives cycles from an interval timer; a poll
// guard keeps at most one cycle in flight, and transient failures switch
// the schedule to exponential backoff until the next success.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beszel_api::{BeszelClient, Credentials, TlsMode, TransportConfig};

use crate::backoff::Backoff;
use crate::config::{MonitorConfig, TlsVerification};
use crate::error::{CoreError, PollError};
use crate::model::SnapshotSet;
use crate::poller::Poller;
use crate::store::{SnapshotDiff, SnapshotStore};

// ── MonitorState ─────────────────────────────────────────────────

/// Coordinator state observable by hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    /// Created but not started, or no cycle has completed yet.
    Idle,
    /// The last cycle succeeded.
    Ready { last_success: DateTime<Utc> },
    /// The last cycle failed transiently; the next attempt waits `delay`.
    Retrying { attempt: u32, delay: Duration, error: String },
    /// The last cycle failed permanently; the regular interval applies.
    Failed { error: PollError },
    /// Shut down.
    Stopped,
}

impl MonitorState {
    /// Short label for logs and tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready { .. } => "ready",
            Self::Retrying { .. } => "retrying",
            Self::Failed { .. } => "failed",
            Self::Stopped => "stopped",
        }
    }
}

/// Result of one requested cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// New snapshot published.
    Updated(SnapshotDiff),
    /// The cycle failed; the previous snapshot is still served.
    Failed {
        error: PollError,
        /// Backoff delay before the next attempt, for transient failures.
        retry_in: Option<Duration>,
    },
    /// Another cycle was already in flight.
    Skipped,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Periodic poller for one hub.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: MonitorConfig,
    poller: Poller,
    store: Arc<SnapshotStore>,
    state: watch::Sender<MonitorState>,
    /// Poll guard; holding it means a cycle is in flight.
    cycle: Mutex<Backoff>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the HTTP client and coordinator. Does not contact the hub.
    pub fn new(config: MonitorConfig) -> Result<Self, CoreError> {
        if config.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be greater than zero".into(),
            });
        }

        let transport = build_transport(&config);
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let client = BeszelClient::new(config.url.clone(), credentials, &transport)?
            .with_token_lifetime(config.token_lifetime);

        Ok(Self::with_client(config, client))
    }

    /// Build a coordinator around an existing client.
    pub fn with_client(config: MonitorConfig, client: BeszelClient) -> Self {
        let poller = Poller::new(Arc::new(client), config.include_docker);
        let (state, _) = watch::channel(MonitorState::Idle);

        Self {
            inner: Arc::new(CoordinatorInner {
                cycle: Mutex::new(Backoff::new(config.backoff)),
                config,
                poller,
                store: Arc::new(SnapshotStore::new()),
                state,
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Run a single cycle and return its snapshot.
    ///
    /// For one-shot hosts (the `poll` command) that don't need the timer.
    pub async fn oneshot(config: MonitorConfig) -> Result<Arc<SnapshotSet>, CoreError> {
        let coordinator = Self::new(config)?;
        match coordinator.refresh_now().await {
            RefreshOutcome::Failed { error, .. } => Err(error.into()),
            RefreshOutcome::Updated(_) | RefreshOutcome::Skipped => {
                coordinator.snapshot().ok_or(CoreError::ShutDown)
            }
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn client(&self) -> &Arc<BeszelClient> {
        self.inner.poller.client()
    }

    /// Whether a bearer token is currently cached.
    pub fn is_authenticated(&self) -> bool {
        self.client().is_authenticated()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the background poll task. The first cycle runs immediately.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return Err(CoreError::AlreadyRunning);
        }

        let ctrl = self.clone();
        let cancel = self.inner.cancel.clone();
        *task = Some(tokio::spawn(poll_task(ctrl, cancel)));
        info!(
            url = %self.inner.config.url,
            interval = ?self.inner.config.poll_interval,
            "coordinator started"
        );
        Ok(())
    }

    /// Stop the timer and wait for the poll task to exit.
    ///
    /// An in-flight request is abandoned. The last snapshot stays readable.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }

        // PocketBase tokens are stateless; logging out only drops our copy.
        self.client().clear_session();
        self.set_state(MonitorState::Stopped);
        debug!("coordinator stopped");
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Run a cycle now, unless one is already in flight.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let Ok(mut backoff) = self.inner.cycle.try_lock() else {
            debug!("poll already in flight, skipping refresh");
            return RefreshOutcome::Skipped;
        };

        let previous = self.inner.store.current();
        match self.inner.poller.poll(previous.as_deref()).await {
            Ok(snapshot) => {
                backoff.reset();
                let systems = snapshot.systems.len();
                let containers = snapshot.containers.len();
                let last_success = snapshot.fetched_at;
                let diff = self.inner.store.apply(snapshot);
                debug!(systems, containers, "poll cycle succeeded");
                self.set_state(MonitorState::Ready { last_success });
                RefreshOutcome::Updated(diff)
            }
            Err(error) if error.is_transient() => {
                let delay = backoff.next_delay();
                let attempt = backoff.attempt();
                warn!(error = %error, attempt, retry_in = ?delay, "poll cycle failed, backing off");
                self.set_state(MonitorState::Retrying {
                    attempt,
                    delay,
                    error: error.to_string(),
                });
                RefreshOutcome::Failed {
                    error,
                    retry_in: Some(delay),
                }
            }
            Err(error) => {
                backoff.reset();
                if error.is_auth() {
                    warn!(error = %error, "hub rejected credentials; fix the username or password");
                } else {
                    warn!(error = %error, "poll cycle failed");
                }
                self.set_state(MonitorState::Failed {
                    error: error.clone(),
                });
                RefreshOutcome::Failed {
                    error,
                    retry_in: None,
                }
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// The latest successful snapshot, stale or not.
    pub fn snapshot(&self) -> Option<Arc<SnapshotSet>> {
        self.inner.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SnapshotSet>>> {
        self.inner.store.subscribe()
    }

    pub fn subscribe_diffs(&self) -> broadcast::Receiver<Arc<SnapshotDiff>> {
        self.inner.store.subscribe_diffs()
    }

    pub fn state(&self) -> watch::Receiver<MonitorState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> MonitorState {
        self.inner.state.borrow().clone()
    }

    fn set_state(&self, state: MonitorState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &MonitorConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };
    TransportConfig::default()
        .with_tls(tls)
        .with_timeout(config.timeout)
}

/// Wait for the next regular tick, or the backoff delay when retrying.
async fn next_cycle(interval: &mut Interval, retry_in: Option<Duration>) {
    match retry_in {
        Some(delay) => tokio::time::sleep(delay).await,
        None => {
            interval.tick().await;
        }
    }
}

// ── Background task ──────────────────────────────────────────────

async fn poll_task(coordinator: Coordinator, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(coordinator.config().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut retry_in: Option<Duration> = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = next_cycle(&mut interval, retry_in) => {}
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = coordinator.refresh_now() => outcome,
        };

        match outcome {
            RefreshOutcome::Updated(_) => {
                if retry_in.take().is_some() {
                    info!("hub reachable again, resuming regular interval");
                    interval.reset();
                }
            }
            RefreshOutcome::Failed { retry_in: delay, .. } => {
                if delay.is_none() && retry_in.is_some() {
                    interval.reset();
                }
                retry_in = delay;
            }
            RefreshOutcome::Skipped => {}
        }
    }

    debug!("poll task exiting");
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retry_delay_replaces_regular_tick() {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await;

        let mut wait = task::spawn(next_cycle(&mut interval, Some(Duration::from_secs(5))));
        assert_pending!(wait.poll());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_ready!(wait.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn regular_tick_waits_full_interval() {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await;

        let mut wait = task::spawn(next_cycle(&mut interval, None));
        assert_pending!(wait.poll());
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_pending!(wait.poll());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_ready!(wait.poll());
    }

    #[test]
    fn state_labels() {
        assert_eq!(MonitorState::Idle.label(), "idle");
        assert_eq!(MonitorState::Stopped.label(), "stopped");
        assert_eq!(
            MonitorState::Failed {
                error: PollError::Decode {
                    message: "x".into()
                }
            }
            .label(),
            "failed"
        );
    }
}
