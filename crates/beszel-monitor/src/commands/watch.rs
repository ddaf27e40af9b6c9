//! `watch`: run the coordinator and stream changes until Ctrl-C.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use beszel_core::{Coordinator, MonitorState, SnapshotDiff, SnapshotSet};

use crate::cli::{GlobalOpts, OutputFormat, PollView, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::poll;

/// One line of `--output json` watch output.
#[derive(Debug, Serialize)]
struct CycleEvent<'a> {
    fetched_at: chrono::DateTime<chrono::Utc>,
    systems: usize,
    systems_up: usize,
    containers: usize,
    added: &'a [String],
    removed: &'a [String],
}

fn summary(snapshot: &SnapshotSet, diff: &SnapshotDiff, color: bool) -> String {
    use std::fmt::Write;
    let mut line = format!(
        "{} {} systems ({} up), {} containers",
        output::paint_dim(&snapshot.fetched_at.format("%H:%M:%S").to_string(), color),
        snapshot.systems.len(),
        snapshot.systems_up(),
        snapshot.containers.len(),
    );
    for id in &diff.added {
        let _ = write!(line, "\n  {} {id}", output::paint_health("+", true, color));
    }
    for id in &diff.removed {
        let _ = write!(line, "\n  {} {id}", output::paint_health("-", false, color));
    }
    line
}

fn render_cycle(
    snapshot: &SnapshotSet,
    diff: &SnapshotDiff,
    full: bool,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let event = CycleEvent {
                fetched_at: snapshot.fetched_at,
                systems: snapshot.systems.len(),
                systems_up: snapshot.systems_up(),
                containers: snapshot.containers.len(),
                added: &diff.added,
                removed: &diff.removed,
            };
            output::render_json(&event, true)
        }
        OutputFormat::Table | OutputFormat::Plain if full => {
            poll::render(snapshot, PollView::Entities, global)
        }
        OutputFormat::Table => Ok(summary(
            snapshot,
            diff,
            output::should_color(global.color),
        )),
        OutputFormat::Plain => Ok(diff
            .added
            .iter()
            .map(|id| format!("+{id}"))
            .chain(diff.removed.iter().map(|id| format!("-{id}")))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Human description of a state change, printed to stderr.
fn describe_state(state: &MonitorState) -> Option<String> {
    match state {
        MonitorState::Retrying {
            attempt,
            delay,
            error,
        } => Some(format!(
            "poll failed (attempt {attempt}): {error}; retrying in {}",
            humantime::format_duration(*delay)
        )),
        MonitorState::Failed { error } if error.is_auth() => Some(format!(
            "{error}; fix the username or password, polling continues at the regular interval"
        )),
        MonitorState::Failed { error } => Some(format!("poll failed: {error}")),
        MonitorState::Idle | MonitorState::Ready { .. } | MonitorState::Stopped => None,
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (profile, mut monitor) = config::resolve(global)?;
    if let Some(interval) = args.interval {
        monitor.poll_interval = interval;
    }
    if args.no_docker {
        monitor.include_docker = false;
    }

    let coordinator = Coordinator::new(monitor)?;
    let mut diffs = coordinator.subscribe_diffs();
    let mut states = coordinator.state();
    coordinator.start().await?;

    if !global.quiet {
        eprintln!(
            "Watching {} (profile '{profile}', every {}). Ctrl-C to stop.",
            coordinator.config().url,
            humantime::format_duration(coordinator.config().poll_interval)
        );
    }

    let result = watch_loop(&coordinator, &mut diffs, &mut states, args.full, global).await;
    coordinator.shutdown().await;
    result
}

async fn watch_loop(
    coordinator: &Coordinator,
    diffs: &mut tokio::sync::broadcast::Receiver<Arc<SnapshotDiff>>,
    states: &mut tokio::sync::watch::Receiver<MonitorState>,
    full: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                debug!("interrupted, stopping");
                return Ok(());
            }
            received = diffs.recv() => match received {
                Ok(diff) => {
                    if let Some(snapshot) = coordinator.snapshot() {
                        let out = render_cycle(&snapshot, &diff, full, global)?;
                        output::print_output(&out, global.quiet);
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "diff receiver lagged"),
                Err(RecvError::Closed) => return Ok(()),
            },
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = states.borrow_and_update().clone();
                if let Some(message) = describe_state(&state) {
                    eprintln!("{message}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use beszel_core::PollError;

    use super::*;

    #[test]
    fn retrying_state_mentions_delay() {
        let state = MonitorState::Retrying {
            attempt: 2,
            delay: Duration::from_secs(10),
            error: "Hub unreachable: connection refused".into(),
        };
        let message = describe_state(&state).unwrap_or_default();
        assert!(message.contains("attempt 2"));
        assert!(message.contains("10s"));
    }

    #[test]
    fn auth_failure_asks_for_credentials() {
        let state = MonitorState::Failed {
            error: PollError::Auth {
                message: "credentials rejected (HTTP 400)".into(),
            },
        };
        let message = describe_state(&state).unwrap_or_default();
        assert!(message.contains("fix the username or password"));
    }

    #[test]
    fn ready_is_silent() {
        assert!(describe_state(&MonitorState::Stopped).is_none());
        assert!(
            describe_state(&MonitorState::Ready {
                last_success: chrono::Utc::now()
            })
            .is_none()
        );
    }

    #[test]
    fn table_summary_lists_diff() {
        let snapshot = SnapshotSet::empty(chrono::Utc::now());
        let diff = SnapshotDiff {
            added: vec!["a_cpu".into()],
            removed: vec!["b_cpu".into()],
        };
        let summary = summary(&snapshot, &diff, false);
        assert!(summary.contains("0 systems (0 up), 0 containers"));
        assert!(summary.contains("+ a_cpu"));
        assert!(summary.contains("- b_cpu"));
    }
}
