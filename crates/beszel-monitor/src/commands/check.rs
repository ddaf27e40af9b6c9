//! `check`: log in and confirm the systems collection is readable.

use serde::Serialize;
use tracing::debug;

use beszel_core::Coordinator;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CheckReport {
    profile: String,
    hub: String,
    username: String,
    systems: usize,
    collections: Vec<String>,
}

fn detail(report: &CheckReport, color: bool) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        output::paint_health("✓", true, color),
        report.hub
    );
    let _ = writeln!(out, "  profile:     {}", report.profile);
    let _ = writeln!(out, "  username:    {}", report.username);
    let _ = write!(out, "  systems:     {}", report.systems);
    if !report.collections.is_empty() {
        let _ = write!(
            out,
            "\n  collections: {}",
            output::paint_dim(&report.collections.join(", "), color)
        );
    }
    out
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (profile, monitor) = config::resolve(global)?;
    let coordinator = Coordinator::new(monitor)?;
    let client = coordinator.client();

    let systems = client
        .check_connection()
        .await
        .map_err(|e| CliError::from(e).for_profile(&profile))?;

    // Diagnostics only; regular accounts may be refused.
    let collections = match client.list_collections().await {
        Ok(found) => found.into_iter().map(|c| c.name).collect(),
        Err(e) => {
            debug!(error = %e, "collection listing unavailable");
            Vec::new()
        }
    };

    let report = CheckReport {
        profile,
        hub: client.base_url().to_string(),
        username: client.identity().to_owned(),
        systems,
        collections,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| detail(r, color),
        |r| r.systems.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
