// ── Host entity projection ──
//
// Flattens a `SnapshotSet` into the gauge and on/off entities a host
// registers. Unique ids are stable across cycles so hosts can diff them.

use serde::Serialize;

use crate::model::{
    CONTAINER_SENSORS, ContainerSnapshot, DeviceClass, SYSTEM_SENSORS, SnapshotSet,
    SystemSnapshot,
};

/// Value carried by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityState {
    Gauge(f64),
    OnOff(bool),
}

/// One host-facing entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub unique_id: String,
    pub name: String,
    /// Id of the device (system or container) this entity belongs to.
    pub device_id: String,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state: EntityState,
    pub available: bool,
}

impl Entity {
    pub fn gauge_value(&self) -> Option<f64> {
        match self.state {
            EntityState::Gauge(v) => Some(v),
            EntityState::OnOff(_) => None,
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        match self.state {
            EntityState::OnOff(on) => Some(on),
            EntityState::Gauge(_) => None,
        }
    }
}

/// All entities for a snapshot, systems first, then containers.
pub fn entities(snapshot: &SnapshotSet) -> Vec<Entity> {
    let mut out = Vec::new();
    for system in snapshot.systems.values() {
        system_entities(system, &mut out);
    }
    for container in snapshot.containers.values() {
        container_entities(container, &mut out);
    }
    out
}

/// Just the unique ids, in the same order as [`entities`].
pub fn entity_ids(snapshot: &SnapshotSet) -> Vec<String> {
    entities(snapshot).into_iter().map(|e| e.unique_id).collect()
}

fn system_entities(system: &SystemSnapshot, out: &mut Vec<Entity>) {
    let available = system.is_up();
    for spec in SYSTEM_SENSORS {
        let Some(value) = system.metric(spec.key) else {
            continue;
        };
        out.push(Entity {
            unique_id: format!("{}_{}", system.id, spec.key),
            name: format!("{} {}", system.name, spec.label),
            device_id: system.id.clone(),
            unit: spec.unit,
            device_class: spec.device_class,
            state: EntityState::Gauge(value),
            available,
        });
    }

    // Status stays available so hosts can show a system going down.
    out.push(Entity {
        unique_id: format!("{}_status", system.id),
        name: format!("{} Status", system.name),
        device_id: system.id.clone(),
        unit: None,
        device_class: Some(DeviceClass::Connectivity),
        state: EntityState::OnOff(system.is_up()),
        available: true,
    });
}

fn container_entities(container: &ContainerSnapshot, out: &mut Vec<Entity>) {
    let device_id = format!("docker_{}", container.key);
    for spec in CONTAINER_SENSORS {
        let Some(value) = container.metric(spec.key) else {
            continue;
        };
        out.push(Entity {
            unique_id: format!("docker_{}_{}", container.key, spec.key),
            name: format!("Docker {} {}", container.name, spec.label),
            device_id: device_id.clone(),
            unit: spec.unit,
            device_class: spec.device_class,
            state: EntityState::Gauge(value),
            available: container.running,
        });
    }

    out.push(Entity {
        unique_id: format!("docker_{}_status", container.key),
        name: format!("Docker {} Status", container.name),
        device_id,
        unit: None,
        device_class: Some(DeviceClass::Running),
        state: EntityState::OnOff(container.running),
        available: true,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{SystemDetails, SystemStatus};

    fn system(id: &str, status: SystemStatus, metrics: &[(&str, f64)]) -> SystemSnapshot {
        SystemSnapshot {
            id: id.into(),
            name: "nas".into(),
            status,
            host: None,
            port: None,
            metrics: metrics.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
            details: SystemDetails::default(),
            updated: None,
            error: None,
        }
    }

    fn set(systems: Vec<SystemSnapshot>, containers: Vec<ContainerSnapshot>) -> SnapshotSet {
        SnapshotSet {
            systems: systems.into_iter().map(|s| (s.id.clone(), s)).collect(),
            containers: containers.into_iter().map(|c| (c.key.clone(), c)).collect(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn system_entities_have_stable_ids_and_names() {
        let snap = set(
            vec![system("abc", SystemStatus::Up, &[("cpu", 25.5), ("disk_temp", 41.0)])],
            vec![],
        );
        let ents = entities(&snap);

        let ids: Vec<&str> = ents.iter().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["abc_cpu", "abc_disk_temp", "abc_status"]);

        let cpu = &ents[0];
        assert_eq!(cpu.name, "nas CPU Usage");
        assert_eq!(cpu.unit, Some("%"));
        assert_eq!(cpu.gauge_value(), Some(25.5));
        assert!(cpu.available);

        assert_eq!(ents[1].device_class, Some(DeviceClass::Temperature));
        assert_eq!(ents[2].is_on(), Some(true));
    }

    #[test]
    fn gauges_unavailable_while_system_is_down() {
        let snap = set(vec![system("abc", SystemStatus::Down, &[("cpu", 1.0)])], vec![]);
        let ents = entities(&snap);
        assert!(!ents[0].available);
        assert_eq!(ents[1].is_on(), Some(false));
        assert!(ents[1].available);
    }

    #[test]
    fn container_entities_are_prefixed() {
        let container = ContainerSnapshot {
            key: "nas_nginx".into(),
            name: "nginx".into(),
            system_id: "abc".into(),
            system_name: "nas".into(),
            metrics: IndexMap::from([("docker_cpu".to_string(), 0.5)]),
            running: true,
            created: None,
            updated: None,
        };
        let ids = entity_ids(&set(vec![], vec![container]));
        assert_eq!(ids, vec!["docker_nas_nginx_docker_cpu", "docker_nas_nginx_status"]);
    }
}
