//! Per-metric alert thresholds loaded from an INI file.
//!
//! ```ini
//! [general]
//! metrics = cpu, memory
//!
//! [metric_cpu]
//! threshold = 80
//! unit = %
//! ```
//!
//! Every name listed under `general.metrics` needs a `metric_<name>` section
//! with a numeric `threshold`. Metrics that fail this are logged and left
//! out; the rest of the table still loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, File, FileFormat, Map, Value};
use opswatch_types::{Threshold, ThresholdTable};
use thiserror::Error;
use tracing::{info, warn};

/// Errors reading the threshold file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load threshold file {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("metric '{metric}' has no [metric_{metric}] section")]
    MissingSection { metric: String },

    #[error("metric '{metric}' has no threshold")]
    MissingThreshold { metric: String },

    #[error("metric '{metric}' has invalid threshold '{value}'")]
    InvalidThreshold { metric: String, value: String },
}

/// Read-only handle to the threshold table, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ThresholdProvider {
    table: Arc<ThresholdTable>,
}

impl ThresholdProvider {
    /// Load thresholds from an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_err = |source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };

        let store = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .build()
            .map_err(load_err)?;

        let table = Self::from_store(&store);
        info!(path = %path.display(), metrics = table.len(), "thresholds loaded");
        Ok(Self::from(table))
    }

    /// A provider with no thresholds.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &Arc<ThresholdTable> {
        &self.table
    }

    fn from_store(store: &Config) -> ThresholdTable {
        let declared = match store.get_string("general.metrics") {
            Ok(list) => list,
            Err(_) => {
                warn!("no [general] metrics list, threshold table is empty");
                return ThresholdTable::new();
            }
        };

        declared
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| match parse_metric(store, name) {
                Ok(threshold) => Some((name.to_string(), threshold)),
                Err(e) => {
                    warn!("skipping threshold: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl From<ThresholdTable> for ThresholdProvider {
    fn from(table: ThresholdTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }
}

/// Read the `metric_<name>` section for one metric.
pub fn parse_metric(store: &Config, name: &str) -> Result<Threshold, ConfigError> {
    let section: Map<String, Value> = store
        .get_table(&format!("metric_{}", name))
        .map_err(|_| ConfigError::MissingSection {
            metric: name.to_string(),
        })?;

    let raw = section
        .get("threshold")
        .and_then(|v| v.clone().into_string().ok())
        .ok_or_else(|| ConfigError::MissingThreshold {
            metric: name.to_string(),
        })?;

    let threshold = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| ConfigError::InvalidThreshold {
            metric: name.to_string(),
            value: raw.clone(),
        })?;

    let unit = section
        .get("unit")
        .and_then(|v| v.clone().into_string().ok())
        .map(|u| u.trim().to_string())
        .unwrap_or_default();

    Ok(Threshold::new(threshold, unit))
}
