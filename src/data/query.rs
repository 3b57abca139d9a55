//! Flux query builders.

use std::time::Duration;

use opswatch_adapters::{QueryEngine, QueryError};
use opswatch_types::MetricSample;
use tracing::debug;

use super::duration::flux_duration;
use super::shaper::{MetricRowShaper, DEFAULT_IDENTITY_COLUMNS};

/// Quote a string as a Flux string literal.
pub fn flux_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn flux_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = items.into_iter().map(flux_string).collect();
    format!("[{}]", quoted.join(", "))
}

/// Latest value of every metric series, pivoted to one row per entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMetricsQuery {
    pub bucket: String,
    pub measurement: String,
    pub field: String,
    pub window: Duration,
    /// Tag holding the metric name; its values become pivoted columns.
    pub metric_column: String,
    pub identity_columns: Vec<String>,
}

impl LiveMetricsQuery {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: "mqtt_consumer".to_string(),
            field: "value".to_string(),
            window: Duration::from_secs(5 * 60),
            metric_column: "metric".to_string(),
            identity_columns: DEFAULT_IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn render(&self) -> String {
        let identity = flux_list(self.identity_columns.iter().map(String::as_str));
        let kept = flux_list(
            self.identity_columns
                .iter()
                .map(String::as_str)
                .chain([self.metric_column.as_str(), "_value"]),
        );

        format!(
            "from(bucket: {bucket})\n\
             \x20 |> range(start: -{window})\n\
             \x20 |> filter(fn: (r) => r[\"_measurement\"] == {measurement})\n\
             \x20 |> filter(fn: (r) => r[\"_field\"] == {field})\n\
             \x20 |> last()\n\
             \x20 |> keep(columns: {kept})\n\
             \x20 |> pivot(rowKey: {identity}, columnKey: [{metric}], valueColumn: \"_value\")\n",
            bucket = flux_string(&self.bucket),
            window = flux_duration(self.window),
            measurement = flux_string(&self.measurement),
            field = flux_string(&self.field),
            kept = kept,
            identity = identity,
            metric = flux_string(&self.metric_column),
        )
    }

    /// Run the query and shape the result rows.
    pub async fn fetch(
        &self,
        engine: &dyn QueryEngine,
        shaper: &MetricRowShaper,
    ) -> Result<Vec<MetricSample>, QueryError> {
        let rows = engine.query(&self.render()).await?;
        debug!(rows = rows.len(), engine = engine.description(), "live metrics fetched");
        Ok(shaper.shape(rows))
    }
}

/// Most recent value of a single text series within a lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestTextQuery {
    pub bucket: String,
    pub measurement: String,
    pub field: String,
    pub window: Duration,
}

impl LatestTextQuery {
    pub fn render(&self) -> String {
        format!(
            "from(bucket: {bucket})\n\
             \x20 |> range(start: -{window})\n\
             \x20 |> filter(fn: (r) => r[\"_measurement\"] == {measurement})\n\
             \x20 |> filter(fn: (r) => r[\"_field\"] == {field})\n\
             \x20 |> last()\n",
            bucket = flux_string(&self.bucket),
            window = flux_duration(self.window),
            measurement = flux_string(&self.measurement),
            field = flux_string(&self.field),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::shaper::row;
    use opswatch_adapters::{ColumnValue, StaticEngine};
    use opswatch_types::MetricValue;

    #[test]
    fn test_flux_string_escaping() {
        assert_eq!(flux_string("metrics"), r#""metrics""#);
        assert_eq!(flux_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(flux_string(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_live_metrics_render() {
        let flux = LiveMetricsQuery::new("metrics").render();

        assert_eq!(
            flux,
            concat!(
                "from(bucket: \"metrics\")\n",
                "  |> range(start: -5m)\n",
                "  |> filter(fn: (r) => r[\"_measurement\"] == \"mqtt_consumer\")\n",
                "  |> filter(fn: (r) => r[\"_field\"] == \"value\")\n",
                "  |> last()\n",
                "  |> keep(columns: [\"cluster\", \"container\", \"metric\", \"_value\"])\n",
                "  |> pivot(rowKey: [\"cluster\", \"container\"], columnKey: [\"metric\"], valueColumn: \"_value\")\n",
            )
        );
    }

    #[test]
    fn test_live_metrics_custom_identity() {
        let query = LiveMetricsQuery {
            identity_columns: vec!["host".to_string()],
            window: Duration::from_secs(90),
            ..LiveMetricsQuery::new("b")
        };
        let flux = query.render();

        assert!(flux.contains("range(start: -90s)"));
        assert!(flux.contains(r#"keep(columns: ["host", "metric", "_value"])"#));
        assert!(flux.contains(r#"pivot(rowKey: ["host"], columnKey: ["metric"]"#));
    }

    #[test]
    fn test_latest_text_render() {
        let query = LatestTextQuery {
            bucket: "metrics".to_string(),
            measurement: "llm_planner".to_string(),
            field: "response".to_string(),
            window: Duration::from_secs(86_400),
        };

        assert_eq!(
            query.render(),
            concat!(
                "from(bucket: \"metrics\")\n",
                "  |> range(start: -24h)\n",
                "  |> filter(fn: (r) => r[\"_measurement\"] == \"llm_planner\")\n",
                "  |> filter(fn: (r) => r[\"_field\"] == \"response\")\n",
                "  |> last()\n",
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_shapes_rows() {
        let engine = StaticEngine::new("test").respond(
            "mqtt_consumer",
            vec![row(&[
                ("result", ColumnValue::Text("_result".into())),
                ("table", ColumnValue::Integer(0)),
                ("cluster", ColumnValue::Text("east".into())),
                ("container", ColumnValue::Text("web-1".into())),
                ("cpu", ColumnValue::Float(42.5)),
                ("memory", ColumnValue::Null),
            ])],
        );

        let samples = LiveMetricsQuery::new("metrics")
            .fetch(&engine, &MetricRowShaper::default())
            .await
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].field("memory"), Some(&MetricValue::Float(0.0)));
        assert_eq!(engine.issued().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_propagates_errors() {
        let engine = StaticEngine::new("test").fail("mqtt_consumer", QueryError::Timeout);

        let err = LiveMetricsQuery::new("metrics")
            .fetch(&engine, &MetricRowShaper::default())
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Timeout));
    }
}
