//! Metric row shaping.
//!
//! Turns the pivoted rows returned by the live metrics query into one
//! [`MetricSample`] per monitored entity. The shaper knows nothing about
//! which metrics exist: every column that is not query metadata and not an
//! identity column becomes a field, so new metrics show up without a code
//! change.
//!
//! ```text
//! RawRow  { _time, result, table, cluster, container, cpu, memory: null }
//!    │
//!    ├── drop metadata   (_*, result, table)
//!    ├── identity slots  (cluster, container)   never defaulted
//!    └── metric fields   (cpu, memory → 0.0)    nulls become 0.0
//!    ▼
//! MetricSample { entity: (east, web-1), fields: { cpu: 42.5, memory: 0.0 } }
//! ```

use opswatch_types::{EntityKey, MetricSample, MetricValue, RawRow};
use tracing::warn;

/// Prefix the query engine uses for its internal columns (`_time`, `_start`, ...).
pub const METADATA_PREFIX: &str = "_";

/// Literal column names the query engine uses for row provenance.
pub const METADATA_COLUMNS: &[&str] = &["result", "table"];

/// Identity columns used when none are configured.
pub const DEFAULT_IDENTITY_COLUMNS: &[&str] = &["cluster", "container"];

/// Value substituted for a null metric field.
pub const NULL_METRIC_DEFAULT: f64 = 0.0;

/// Check whether a column is query-engine metadata and must be dropped.
pub fn is_metadata_column(name: &str) -> bool {
    name.starts_with(METADATA_PREFIX) || METADATA_COLUMNS.contains(&name)
}

/// Reshapes raw query rows into entity-centric metric samples.
///
/// The shaper holds no mutable state and can be shared freely between
/// request handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRowShaper {
    identity_columns: Vec<String>,
}

impl Default for MetricRowShaper {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_COLUMNS.iter().copied())
    }
}

impl MetricRowShaper {
    /// Create a shaper with the given identity columns, in key order.
    pub fn new<I, S>(identity_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity_columns: identity_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a column identifies the entity.
    pub fn is_identity_column(&self, name: &str) -> bool {
        self.identity_columns.iter().any(|c| c == name)
    }

    /// Shape every row, one sample per row, keeping engine order.
    pub fn shape(&self, rows: Vec<RawRow>) -> Vec<MetricSample> {
        let samples: Vec<MetricSample> = rows.into_iter().map(|row| self.shape_row(row)).collect();

        let incomplete = samples.iter().filter(|s| !s.entity.is_complete()).count();
        if incomplete > 0 {
            warn!(
                rows = incomplete,
                "metric rows with null identity columns, emitting them with unset identity"
            );
        }

        samples
    }

    /// Shape a single row.
    pub fn shape_row(&self, row: RawRow) -> MetricSample {
        let mut slots: Vec<(String, Option<String>)> = Vec::new();
        let mut sample = MetricSample::default();

        for (name, value) in row {
            if is_metadata_column(&name) {
                continue;
            }

            if self.is_identity_column(&name) {
                let identity = if value.is_null() { None } else { Some(value.to_string()) };
                slots.push((name, identity));
                continue;
            }

            let value = MetricValue::from_column(value)
                .unwrap_or(MetricValue::Float(NULL_METRIC_DEFAULT));
            sample.fields.insert(name, value);
        }

        sample.entity = self.entity_key(slots);
        sample
    }

    /// Order identity slots by configured column order.
    fn entity_key(&self, mut slots: Vec<(String, Option<String>)>) -> EntityKey {
        slots.sort_by_key(|(name, _)| {
            self.identity_columns
                .iter()
                .position(|c| c == name)
                .unwrap_or(usize::MAX)
        });

        let mut key = EntityKey::new();
        for (name, value) in slots {
            key.push(name, value);
        }
        key
    }
}

/// Convenience for building rows in tests and demos.
#[cfg(test)]
pub(crate) fn row(pairs: &[(&str, opswatch_types::ColumnValue)]) -> RawRow {
    RawRow::from_pairs(
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opswatch_types::ColumnValue;

    fn text(s: &str) -> ColumnValue {
        ColumnValue::Text(s.to_string())
    }

    fn pivoted_row() -> RawRow {
        row(&[
            ("_time", ColumnValue::Time("2024-05-01T10:00:00Z".into())),
            ("result", text("_result")),
            ("table", ColumnValue::Integer(0)),
            ("cluster", text("east")),
            ("container", text("web-1")),
            ("cpu", ColumnValue::Float(42.5)),
            ("memory", ColumnValue::Null),
        ])
    }

    #[test]
    fn test_metadata_classification() {
        assert!(is_metadata_column("_time"));
        assert!(is_metadata_column("_start"));
        assert!(is_metadata_column("_value"));
        assert!(is_metadata_column("result"));
        assert!(is_metadata_column("table"));
        assert!(!is_metadata_column("cluster"));
        assert!(!is_metadata_column("cpu"));
        assert!(!is_metadata_column("tables"));
        assert!(!is_metadata_column("my_result"));
    }

    #[test]
    fn test_shape_pivoted_row() {
        let sample = MetricRowShaper::default().shape_row(pivoted_row());

        let expected = MetricSample::new(
            EntityKey::new()
                .with("cluster", Some("east".to_string()))
                .with("container", Some("web-1".to_string())),
        )
        .with_field("cpu", MetricValue::Float(42.5))
        .with_field("memory", MetricValue::Float(0.0));

        assert_eq!(sample, expected);
    }

    #[test]
    fn test_shape_empty_input() {
        assert!(MetricRowShaper::default().shape(Vec::new()).is_empty());
    }

    #[test]
    fn test_no_metadata_survives() {
        let samples = MetricRowShaper::default().shape(vec![
            pivoted_row(),
            row(&[
                ("_start", ColumnValue::Time("t0".into())),
                ("_stop", ColumnValue::Time("t1".into())),
                ("_measurement", text("mqtt_consumer")),
                ("result", ColumnValue::Null),
                ("table", ColumnValue::Null),
                ("cluster", text("west")),
                ("disk", ColumnValue::Float(3.0)),
            ]),
        ]);

        for sample in &samples {
            for name in sample.fields.keys() {
                assert!(!is_metadata_column(name), "metadata column leaked: {}", name);
            }
            for (name, _) in sample.entity.iter() {
                assert!(!is_metadata_column(name), "metadata column leaked: {}", name);
            }
        }
    }

    #[test]
    fn test_null_fields_are_substituted() {
        let sample = MetricRowShaper::default().shape_row(row(&[
            ("cluster", text("east")),
            ("container", text("web-1")),
            ("cpu", ColumnValue::Null),
            ("gpu", ColumnValue::Null),
            ("restarts", ColumnValue::Integer(2)),
        ]));

        assert_eq!(sample.field("cpu"), Some(&MetricValue::Float(0.0)));
        assert_eq!(sample.field("gpu"), Some(&MetricValue::Float(0.0)));
        assert_eq!(sample.field("restarts"), Some(&MetricValue::Integer(2)));
    }

    #[test]
    fn test_non_finite_fields_are_substituted() {
        let sample = MetricRowShaper::default().shape_row(row(&[
            ("cluster", text("east")),
            ("container", text("web-1")),
            ("cpu", ColumnValue::Float(f64::NAN)),
            ("memory", ColumnValue::Float(f64::INFINITY)),
            ("disk", ColumnValue::Float(f64::NEG_INFINITY)),
        ]));

        for metric in ["cpu", "memory", "disk"] {
            assert_eq!(sample.field(metric), Some(&MetricValue::Float(0.0)), "{}", metric);
        }

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cluster": "east",
                "container": "web-1",
                "cpu": 0.0,
                "disk": 0.0,
                "memory": 0.0
            })
        );
    }

    #[test]
    fn test_unseen_metric_becomes_field() {
        let mut r = pivoted_row();
        r.push("pippo", ColumnValue::Float(7.0));
        r.push("disk_usage", ColumnValue::Unsigned(9));

        let sample = MetricRowShaper::default().shape_row(r);
        assert_eq!(sample.field("pippo"), Some(&MetricValue::Float(7.0)));
        assert_eq!(sample.field("disk_usage"), Some(&MetricValue::Unsigned(9)));
        assert_eq!(sample.fields.len(), 4);
    }

    #[test]
    fn test_identity_never_defaulted() {
        let sample = MetricRowShaper::default().shape_row(row(&[
            ("cluster", text("east")),
            ("container", ColumnValue::Null),
            ("cpu", ColumnValue::Float(1.0)),
        ]));

        assert_eq!(sample.entity.get("cluster"), Some("east"));
        assert_eq!(sample.entity.get("container"), None);
        assert_eq!(sample.entity.len(), 2);
        assert!(!sample.entity.is_complete());
        assert!(sample.field("container").is_none());
    }

    #[test]
    fn test_absent_identity_column_has_no_slot() {
        let sample = MetricRowShaper::default().shape_row(row(&[
            ("cluster", text("east")),
            ("cpu", ColumnValue::Float(1.0)),
        ]));

        assert_eq!(sample.entity.len(), 1);
        assert!(sample.entity.is_complete());
    }

    #[test]
    fn test_identity_follows_configured_order() {
        let sample = MetricRowShaper::default().shape_row(row(&[
            ("container", text("web-1")),
            ("cpu", ColumnValue::Float(1.0)),
            ("cluster", text("east")),
        ]));

        let order: Vec<&str> = sample.entity.iter().map(|(name, _)| name).collect();
        assert_eq!(order, vec!["cluster", "container"]);
    }

    #[test]
    fn test_custom_identity_columns() {
        let shaper = MetricRowShaper::new(["host"]);
        let sample = shaper.shape_row(row(&[
            ("host", ColumnValue::Integer(12)),
            ("cluster", text("east")),
            ("load", ColumnValue::Float(0.5)),
        ]));

        assert_eq!(sample.entity.get("host"), Some("12"));
        assert_eq!(sample.field("cluster"), Some(&MetricValue::Text("east".into())));
        assert_eq!(sample.field("load"), Some(&MetricValue::Float(0.5)));
    }

    #[test]
    fn test_preserves_row_order() {
        let rows = ["web-3", "web-1", "web-2"]
            .iter()
            .map(|c| row(&[("cluster", text("east")), ("container", text(c))]))
            .collect();

        let containers: Vec<String> = MetricRowShaper::default()
            .shape(rows)
            .iter()
            .filter_map(|s| s.entity.get("container").map(str::to_string))
            .collect();

        assert_eq!(containers, vec!["web-3", "web-1", "web-2"]);
    }

    #[test]
    fn test_shaper_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetricRowShaper>();
    }
}
