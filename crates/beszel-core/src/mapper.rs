// ── Raw record to snapshot mapping ──
//
// Pure transforms from `beszel_api` records into `SnapshotSet`. No I/O,
// no error path: a missing or non-numeric field simply produces no metric.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use beszel_api::{ContainerStatsRecord, SystemRecord};

use crate::model::{
    CONTAINER_SENSORS, ContainerSnapshot, SYSTEM_SENSORS, SensorSpec, SnapshotSet,
    SystemDetails, SystemSnapshot, SystemStatus, container_key,
};

/// A system record plus the outcome of its detail request.
#[derive(Debug, Clone)]
pub struct RawSystem {
    pub record: SystemRecord,
    /// Set when the detail request failed and `record` is the list entry.
    pub detail_error: Option<String>,
}

/// Where the cycle's container data came from.
#[derive(Debug, Clone, Default)]
pub enum RawContainers {
    /// Docker monitoring is off.
    #[default]
    Disabled,
    /// Rows from the `container_stats` collection, newest first.
    Stats(Vec<ContainerStatsRecord>),
    /// Raw items from fallback collections, paired with the collection name.
    Fallback(Vec<(String, Vec<Value>)>),
}

/// Everything one poll cycle fetched, before mapping.
#[derive(Debug, Clone)]
pub struct RawPoll {
    pub systems: Vec<RawSystem>,
    pub containers: RawContainers,
    pub fetched_at: DateTime<Utc>,
}

/// Map a cycle's raw records into a snapshot set.
///
/// Deterministic: the same input always yields the same output.
pub fn map(raw: &RawPoll) -> SnapshotSet {
    let mut systems = IndexMap::with_capacity(raw.systems.len());
    for entry in &raw.systems {
        let mut snapshot = map_system(&entry.record);
        snapshot.error.clone_from(&entry.detail_error);
        systems.insert(snapshot.id.clone(), snapshot);
    }

    let names: HashMap<&str, &str> = systems
        .values()
        .map(|s: &SystemSnapshot| (s.id.as_str(), s.name.as_str()))
        .collect();

    let containers = match &raw.containers {
        RawContainers::Disabled => IndexMap::new(),
        RawContainers::Stats(records) => map_container_stats(records, &names),
        RawContainers::Fallback(collections) => map_fallback_records(collections, &names),
    };

    SnapshotSet {
        systems,
        containers,
        fetched_at: raw.fetched_at,
    }
}

/// Map one system record through the system sensor table.
pub fn map_system(record: &SystemRecord) -> SystemSnapshot {
    let name = if record.name.is_empty() {
        format!("System {}", record.id)
    } else {
        record.name.clone()
    };

    SystemSnapshot {
        id: record.id.clone(),
        name,
        status: SystemStatus::from(record.status.as_str()),
        host: record.host.clone().filter(|h| !h.is_empty()),
        port: record.port.clone(),
        metrics: extract_metrics(&record.info, SYSTEM_SENSORS),
        details: extract_details(&record.info),
        updated: parse_timestamp(record.updated.as_deref()),
        error: None,
    }
}

/// Containers from `container_stats` rows, using only the newest row per system.
pub fn map_container_stats(
    records: &[ContainerStatsRecord],
    names: &HashMap<&str, &str>,
) -> IndexMap<String, ContainerSnapshot> {
    let mut latest: IndexMap<&str, &ContainerStatsRecord> = IndexMap::new();
    for record in records {
        let Some(created) = record.created.as_deref() else {
            continue;
        };
        if record.system.is_empty() {
            continue;
        }
        let newer = latest
            .get(record.system.as_str())
            .and_then(|current| current.created.as_deref())
            .is_none_or(|current| created > current);
        if newer {
            latest.insert(record.system.as_str(), record);
        }
    }

    let mut containers = IndexMap::new();
    for (system_id, record) in latest {
        let system_name = system_name(names, system_id);
        let Some(items) = stats_items(&record.stats, system_id) else {
            continue;
        };

        for item in &items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let Some(name) = obj.get("n").and_then(Value::as_str) else {
                debug!(system_id, "skipping stats item without container name");
                continue;
            };

            let snapshot = ContainerSnapshot {
                key: container_key(&system_name, name),
                name: name.to_owned(),
                system_id: system_id.to_owned(),
                system_name: system_name.clone(),
                metrics: extract_metrics(obj, CONTAINER_SENSORS),
                running: true,
                created: parse_timestamp(record.created.as_deref()),
                updated: parse_timestamp(record.updated.as_deref()),
            };
            containers.insert(snapshot.key.clone(), snapshot);
        }
    }
    containers
}

/// Containers recovered from fallback collections.
///
/// Recognizes three item shapes: a `containers` array or object nested in
/// the item, or an item that is itself a container (`n` or
/// `container_name`).
pub fn map_fallback_records(
    collections: &[(String, Vec<Value>)],
    names: &HashMap<&str, &str>,
) -> IndexMap<String, ContainerSnapshot> {
    let mut containers = IndexMap::new();

    for (collection, items) in collections {
        for item in items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let system_id = obj.get("system").and_then(Value::as_str).unwrap_or_default();
            let system_name = system_name(names, system_id);
            let created = parse_timestamp(obj.get("created").and_then(Value::as_str));
            let updated = parse_timestamp(obj.get("updated").and_then(Value::as_str));

            let mut push = |name: &str, stats: &Map<String, Value>| {
                let snapshot = ContainerSnapshot {
                    key: container_key(&system_name, name),
                    name: name.to_owned(),
                    system_id: system_id.to_owned(),
                    system_name: system_name.clone(),
                    metrics: extract_metrics(stats, CONTAINER_SENSORS),
                    running: is_running(stats),
                    created,
                    updated,
                };
                containers.entry(snapshot.key.clone()).or_insert(snapshot);
            };

            match obj.get("containers") {
                Some(Value::Array(list)) => {
                    for entry in list.iter().filter_map(Value::as_object) {
                        let name = entry
                            .get("name")
                            .or_else(|| entry.get("n"))
                            .and_then(Value::as_str)
                            .unwrap_or("unknown");
                        push(name, entry);
                    }
                }
                Some(Value::Object(map)) => {
                    for (name, stats) in map {
                        if let Some(stats) = stats.as_object() {
                            push(name, stats);
                        }
                    }
                }
                _ => {
                    let name = obj
                        .get("container_name")
                        .or_else(|| obj.get("n"))
                        .and_then(Value::as_str);
                    match name {
                        Some(name) => push(name, obj),
                        None => debug!(collection, "item is not container data"),
                    }
                }
            }
        }
    }

    containers
}

// ── Helpers ────────────────────────────────────────────────────────

fn system_name(names: &HashMap<&str, &str>, system_id: &str) -> String {
    names
        .get(system_id)
        .map_or_else(|| format!("Unknown-{system_id}"), |n| (*n).to_owned())
}

/// `stats` is normally an array; older hubs stored it as a JSON string.
fn stats_items(stats: &Value, system_id: &str) -> Option<Vec<Value>> {
    match stats {
        Value::Array(items) => Some(items.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Some(items),
            Ok(_) => {
                debug!(system_id, "decoded stats string is not an array");
                None
            }
            Err(e) => {
                warn!(system_id, error = %e, "failed to parse stats JSON string");
                None
            }
        },
        Value::Null => None,
        other => {
            debug!(system_id, kind = json_kind(other), "unexpected stats shape");
            None
        }
    }
}

fn extract_metrics(fields: &Map<String, Value>, table: &[SensorSpec]) -> IndexMap<String, f64> {
    table
        .iter()
        .filter_map(|spec| {
            fields
                .get(spec.field)
                .and_then(numeric)
                .map(|v| (spec.key.to_owned(), round2(v)))
        })
        .collect()
}

fn extract_details(info: &Map<String, Value>) -> SystemDetails {
    let text = |key: &str| -> Option<String> {
        match info.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    let count = |key: &str| -> Option<u32> {
        info.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };

    SystemDetails {
        hostname: text("h"),
        kernel: text("k"),
        cpu_cores: count("c"),
        cpu_threads: count("t"),
        cpu_model: text("m"),
        agent_version: text("v"),
        os: text("os"),
    }
}

/// Numbers and numeric strings; everything else is treated as absent.
fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn is_running(stats: &Map<String, Value>) -> bool {
    stats
        .get("status")
        .and_then(Value::as_str)
        .is_none_or(|s| matches!(s.to_ascii_lowercase().as_str(), "running" | "up"))
}

/// PocketBase writes `2024-06-15 10:30:00.123Z`; accept RFC 3339 too.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn system(value: Value) -> SystemRecord {
        serde_json::from_value(value).unwrap()
    }

    fn stats_row(value: Value) -> ContainerStatsRecord {
        serde_json::from_value(value).unwrap()
    }

    fn raw_with(systems: Vec<SystemRecord>, containers: RawContainers) -> RawPoll {
        RawPoll {
            systems: systems
                .into_iter()
                .map(|record| RawSystem {
                    record,
                    detail_error: None,
                })
                .collect(),
            containers,
            fetched_at: DateTime::from_timestamp(1_718_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn cpu_value_passes_through() {
        let snap = map_system(&system(json!({
            "id": "s1", "name": "nas", "status": "up",
            "info": { "cpu": 25.5 }
        })));
        assert_eq!(snap.metric("cpu"), Some(25.5));
    }

    #[test]
    fn system_table_maps_abbreviated_fields() {
        let snap = map_system(&system(json!({
            "id": "s1",
            "name": "nas",
            "status": "up",
            "info": {
                "cpu": 12.3456, "mp": 40, "dp": "70.129",
                "dt": 38.2, "u": 86400, "b": 1.5,
                "h": "nas.lan", "k": "6.1.0", "c": 4, "t": 8,
                "m": "Intel N100", "v": "0.9.1", "os": 0
            }
        })));

        let metrics: Vec<(&str, f64)> = snap
            .metrics
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(
            metrics,
            vec![
                ("cpu", 12.35),
                ("memory", 40.0),
                ("disk", 70.13),
                ("disk_temp", 38.2),
                ("uptime", 86400.0),
                ("bandwidth", 1.5),
            ]
        );
        assert_eq!(snap.details.hostname.as_deref(), Some("nas.lan"));
        assert_eq!(snap.details.cpu_threads, Some(8));
        assert_eq!(snap.details.os.as_deref(), Some("0"));
    }

    #[test]
    fn non_numeric_and_missing_fields_are_omitted() {
        let snap = map_system(&system(json!({
            "id": "s1", "status": "up",
            "info": { "cpu": "n/a", "mp": null, "dp": true }
        })));
        assert!(snap.metrics.is_empty());
        assert_eq!(snap.name, "System s1");
    }

    #[test]
    fn status_mapping() {
        for (raw, up) in [("up", true), ("down", false), ("paused", false), ("bogus", false)] {
            let snap = map_system(&system(json!({ "id": "s", "status": raw })));
            assert_eq!(snap.is_up(), up, "status {raw}");
        }
    }

    #[test]
    fn pocketbase_timestamps_parse() {
        let dt = parse_timestamp(Some("2024-06-15 10:30:00.123Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-06-15T10:30:00.123+00:00");
        assert!(parse_timestamp(Some("2024-06-15T10:30:00Z")).is_some());
        assert!(parse_timestamp(Some("")).is_none());
        assert!(parse_timestamp(Some("yesterday")).is_none());
    }

    #[test]
    fn mapping_is_idempotent() {
        let raw = raw_with(
            vec![system(json!({
                "id": "s1", "name": "nas", "status": "up",
                "info": { "cpu": 1.0, "mp": 2.0 }
            }))],
            RawContainers::Stats(vec![stats_row(json!({
                "system": "s1",
                "created": "2024-06-15 10:30:00.000Z",
                "stats": [{ "n": "nginx", "c": 0.5 }]
            }))]),
        );
        assert_eq!(map(&raw), map(&raw));
    }

    #[test]
    fn detail_error_is_carried_into_snapshot() {
        let mut raw = raw_with(
            vec![system(json!({ "id": "s1", "name": "nas", "status": "up" }))],
            RawContainers::Disabled,
        );
        raw.systems[0].detail_error = Some("HTTP 500".into());
        let set = map(&raw);
        assert_eq!(set.system("s1").unwrap().error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn only_latest_container_row_per_system_is_used() {
        let rows = vec![
            stats_row(json!({
                "system": "s1",
                "created": "2024-06-15 10:31:00.000Z",
                "stats": [{ "n": "nginx", "c": 2.0, "m": 128.456, "ns": 0.1, "nr": 0.2 }]
            })),
            stats_row(json!({
                "system": "s1",
                "created": "2024-06-15 10:30:00.000Z",
                "stats": [{ "n": "nginx", "c": 1.0 }, { "n": "old", "c": 9.0 }]
            })),
        ];
        let names = HashMap::from([("s1", "nas")]);
        let containers = map_container_stats(&rows, &names);

        assert_eq!(containers.len(), 1);
        let nginx = containers.get("nas_nginx").unwrap();
        assert_eq!(nginx.metric("docker_cpu"), Some(2.0));
        assert_eq!(nginx.metric("docker_memory"), Some(128.46));
        assert_eq!(nginx.metric("docker_network_tx"), Some(0.1));
        assert_eq!(nginx.metric("docker_network_rx"), Some(0.2));
        assert!(nginx.running);
    }

    #[test]
    fn stats_encoded_as_string_are_decoded() {
        let rows = vec![stats_row(json!({
            "system": "s9",
            "created": "2024-06-15 10:30:00.000Z",
            "stats": "[{\"n\":\"redis\",\"c\":0.25},{\"c\":1.0}]"
        }))];
        let containers = map_container_stats(&rows, &HashMap::new());

        let keys: Vec<&str> = containers.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Unknown-s9_redis"]);
    }

    #[test]
    fn rows_without_system_or_created_are_ignored() {
        let rows = vec![
            stats_row(json!({ "system": "s1", "stats": [{ "n": "a" }] })),
            stats_row(json!({ "created": "2024-06-15 10:30:00.000Z", "stats": [{ "n": "b" }] })),
        ];
        assert!(map_container_stats(&rows, &HashMap::new()).is_empty());
    }

    #[test]
    fn fallback_shapes_are_recognized() {
        let collections = vec![(
            "containers".to_string(),
            vec![
                json!({ "system": "s1", "containers": [{ "name": "web", "c": 3.0 }] }),
                json!({ "system": "s1", "containers": { "db": { "c": 1.0, "status": "exited" } } }),
                json!({ "system": "s1", "n": "cache", "m": 64 }),
                json!({ "system": "s1", "cpu": 5 }),
            ],
        )];
        let names = HashMap::from([("s1", "nas")]);
        let containers = map_fallback_records(&collections, &names);

        let keys: Vec<&str> = containers.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["nas_web", "nas_db", "nas_cache"]);
        assert!(!containers.get("nas_db").unwrap().running);
        assert_eq!(containers.get("nas_cache").unwrap().metric("docker_memory"), Some(64.0));
    }
}
