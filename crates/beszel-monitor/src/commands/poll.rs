//! `poll`: one cycle, printed as entities, systems, or containers.

use tabled::Tabled;

use beszel_core::{
    ContainerSnapshot, Coordinator, Entity, EntityState, SnapshotSet, SystemSnapshot,
};

use crate::cli::{GlobalOpts, PollArgs, PollView};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Class")]
    class: String,
}

impl EntityRow {
    pub fn new(entity: &Entity, color: bool) -> Self {
        let state = if entity.available {
            entity_state(entity, color)
        } else {
            output::paint_dim("unavailable", color)
        };
        Self {
            id: entity.unique_id.clone(),
            name: entity.name.clone(),
            state,
            class: entity
                .device_class
                .map(|c| c.to_string())
                .unwrap_or_default(),
        }
    }
}

/// `25.5 %`, `on`, `off`.
pub fn entity_state(entity: &Entity, color: bool) -> String {
    match entity.state {
        EntityState::Gauge(v) => match entity.unit {
            Some(unit) => format!("{} {unit}", output::format_value(v)),
            None => output::format_value(v),
        },
        EntityState::OnOff(on) => output::paint_health(on_off(on), on, color),
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// `id=value` for plain output.
pub fn entity_line(entity: &Entity) -> String {
    let value = match entity.state {
        EntityState::Gauge(v) if entity.available => output::format_value(v),
        EntityState::OnOff(on) if entity.available => on_off(on).to_owned(),
        _ => "unavailable".to_owned(),
    };
    format!("{}={value}", entity.unique_id)
}

#[derive(Tabled)]
struct SystemRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "Mem %")]
    memory: String,
    #[tabled(rename = "Disk %")]
    disk: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl SystemRow {
    fn new(system: &SystemSnapshot, color: bool) -> Self {
        let metric = |key: &str| {
            system
                .metric(key)
                .map(output::format_value)
                .unwrap_or_default()
        };
        let mut status = output::paint_health(system.status.as_str(), system.is_up(), color);
        if system.error.is_some() {
            status.push('*');
        }
        Self {
            id: system.id.clone(),
            name: system.name.clone(),
            status,
            host: system.host.clone().unwrap_or_default(),
            cpu: metric("cpu"),
            memory: metric("memory"),
            disk: metric("disk"),
            updated: system
                .updated
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "System")]
    system: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Running")]
    running: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "Mem MB")]
    memory: String,
}

impl ContainerRow {
    fn new(container: &ContainerSnapshot, color: bool) -> Self {
        let metric = |key: &str| {
            container
                .metric(key)
                .map(output::format_value)
                .unwrap_or_default()
        };
        Self {
            key: container.key.clone(),
            system: container.system_name.clone(),
            name: container.name.clone(),
            running: output::paint_health(
                if container.running { "yes" } else { "no" },
                container.running,
                color,
            ),
            cpu: metric("docker_cpu"),
            memory: metric("docker_memory"),
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────

pub fn render(
    snapshot: &SnapshotSet,
    view: PollView,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    match view {
        PollView::Entities => {
            let all = beszel_core::entities(snapshot);
            output::render_list(global.output, &all, |e| EntityRow::new(e, color), entity_line)
        }
        PollView::Systems => {
            let systems: Vec<&SystemSnapshot> = snapshot.systems.values().collect();
            output::render_list(
                global.output,
                &systems,
                |s| SystemRow::new(s, color),
                |s| s.id.clone(),
            )
        }
        PollView::Containers => {
            let containers: Vec<&ContainerSnapshot> = snapshot.containers.values().collect();
            output::render_list(
                global.output,
                &containers,
                |c| ContainerRow::new(c, color),
                |c| c.key.clone(),
            )
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: PollArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (profile, mut monitor) = config::resolve(global)?;
    if args.no_docker {
        monitor.include_docker = false;
    }

    let snapshot = Coordinator::oneshot(monitor)
        .await
        .map_err(|e| CliError::from(e).for_profile(&profile))?;

    tracing::debug!(
        systems = snapshot.systems.len(),
        up = snapshot.systems_up(),
        containers = snapshot.containers.len(),
        "poll complete"
    );

    let out = render(&snapshot, args.view, global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
