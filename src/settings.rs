//! Service settings.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `INFLUXDB_URL`, `INFLUXDB_TOKEN`, `INFLUXDB_ORG`, `INFLUXDB_BUCKET`
//! 3. the TOML settings file, if present
//! 4. `OPSWATCH__<SECTION>__<KEY>` environment variables
//!
//! ```toml
//! listen_addr = "0.0.0.0:8080"
//! thresholds_path = "config.ini"
//!
//! [influx]
//! url = "http://influxdb:8086"
//! org = "AIops_org"
//! bucket = "AIops_bucket"
//! timeout = "10s"
//!
//! [metrics]
//! identity_columns = ["cluster", "container"]
//! window = "5m"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Deserializer};

use crate::data::duration::parse_duration;
use crate::data::shaper::DEFAULT_IDENTITY_COLUMNS;
use crate::data::{LiveMetricsQuery, MetricRowShaper, NarrativeFetcher};

/// Environment variables understood by the rest of the stack, mapped to
/// settings keys.
const INFLUXDB_ENV: &[(&str, &str)] = &[
    ("INFLUXDB_URL", "influx.url"),
    ("INFLUXDB_TOKEN", "influx.token"),
    ("INFLUXDB_ORG", "influx.org"),
    ("INFLUXDB_BUCKET", "influx.bucket"),
];

const ENV_PREFIX: &str = "OPSWATCH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub thresholds_path: PathBuf,
    pub influx: InfluxSettings,
    pub metrics: MetricsSettings,
    pub narrative: NarrativeSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InfluxSettings {
    pub url: String,
    pub org: String,
    pub token: String,
    pub bucket: String,
    #[serde(deserialize_with = "duration_str")]
    pub timeout: Duration,
    #[serde(deserialize_with = "duration_str")]
    pub retry_backoff: Duration,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub measurement: String,
    pub field: String,
    pub metric_column: String,
    pub identity_columns: Vec<String>,
    #[serde(deserialize_with = "duration_str")]
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NarrativeSettings {
    pub field: String,
    #[serde(deserialize_with = "duration_str")]
    pub window: Duration,
    pub planner_measurement: String,
    pub analysis_measurement: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            thresholds_path: PathBuf::from("config.ini"),
            influx: InfluxSettings::default(),
            metrics: MetricsSettings::default(),
            narrative: NarrativeSettings::default(),
        }
    }
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "AIops_org".to_string(),
            token: String::new(),
            bucket: "AIops_bucket".to_string(),
            timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(250),
            retry_attempts: 2,
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        let query = LiveMetricsQuery::new("");
        Self {
            measurement: query.measurement,
            field: query.field,
            metric_column: query.metric_column,
            identity_columns: DEFAULT_IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            window: query.window,
        }
    }
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        let fetcher = NarrativeFetcher::new("");
        Self {
            field: fetcher.field,
            window: fetcher.window,
            planner_measurement: fetcher.planner_measurement,
            analysis_measurement: fetcher.analysis_measurement,
        }
    }
}

impl Settings {
    /// Load settings from `path` and the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_from(path, std::env::vars().collect())
    }

    /// Load settings from `path` and the given environment.
    pub fn load_from(path: &Path, env: Map<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        for (var, key) in INFLUXDB_ENV {
            if let Some(value) = env.get(*var) {
                builder = builder.set_default(*key, value.as_str())?;
            }
        }

        let config = builder
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(Some(env))
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("metrics.identity_columns"),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn shaper(&self) -> MetricRowShaper {
        MetricRowShaper::new(self.metrics.identity_columns.iter().cloned())
    }

    pub fn live_metrics_query(&self) -> LiveMetricsQuery {
        LiveMetricsQuery {
            bucket: self.influx.bucket.clone(),
            measurement: self.metrics.measurement.clone(),
            field: self.metrics.field.clone(),
            window: self.metrics.window,
            metric_column: self.metrics.metric_column.clone(),
            identity_columns: self.metrics.identity_columns.clone(),
        }
    }

    pub fn narrative_fetcher(&self) -> NarrativeFetcher {
        NarrativeFetcher {
            bucket: self.influx.bucket.clone(),
            field: self.narrative.field.clone(),
            window: self.narrative.window,
            planner_measurement: self.narrative.planner_measurement.clone(),
            analysis_measurement: self.narrative.analysis_measurement.clone(),
        }
    }
}

fn duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
