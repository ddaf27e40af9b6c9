// Hub record types
//
// Raw PocketBase records as the hub returns them. Metric payloads stay
// loosely typed (`serde_json::Value`) because the field set varies by
// agent version; `beszel-core` maps them through its sensor tables.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// PocketBase list envelope: `{ page, perPage, totalItems, totalPages, items }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

fn first_page() -> u32 {
    1
}

/// A monitored system from the `systems` collection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `"up"`, `"down"`, `"paused"` or `"pending"`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub port: Option<String>,
    /// Abbreviated metric fields reported by the agent (`cpu`, `mp`, `dp`, ...).
    #[serde(default)]
    pub info: Map<String, Value>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// A row from the `container_stats` collection.
///
/// `stats` is an array of per-container objects (`n`, `c`, `m`, `ns`, `nr`);
/// older hubs stored it as a JSON-encoded string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContainerStatsRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(rename = "type", default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub stats: Value,
}

/// Summary of a collection found while probing the hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Number of records on the first page, when probed by name.
    #[serde(default)]
    pub count: Option<usize>,
}

/// Accept `"45876"`, `45876`, or `null` for fields the hub stores loosely.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_record_accepts_numeric_port() {
        let rec: SystemRecord = serde_json::from_value(json!({
            "id": "abc",
            "name": "nas",
            "status": "up",
            "port": 45876,
            "info": { "cpu": 12.5 }
        }))
        .unwrap();
        assert_eq!(rec.port.as_deref(), Some("45876"));
        assert_eq!(rec.info.get("cpu"), Some(&json!(12.5)));
    }

    #[test]
    fn system_record_tolerates_missing_fields() {
        let rec: SystemRecord = serde_json::from_value(json!({ "id": "abc" })).unwrap();
        assert!(rec.name.is_empty());
        assert!(rec.info.is_empty());
        assert!(rec.port.is_none());
    }

    #[test]
    fn list_result_defaults() {
        let page: ListResult<SystemRecord> = serde_json::from_value(json!({})).unwrap();
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn container_stats_type_field_maps_to_interval() {
        let rec: ContainerStatsRecord = serde_json::from_value(json!({
            "id": "r1",
            "system": "sys1",
            "type": "1m",
            "stats": [{ "n": "nginx", "c": 1.5 }]
        }))
        .unwrap();
        assert_eq!(rec.interval.as_deref(), Some("1m"));
        assert!(rec.stats.is_array());
    }
}
