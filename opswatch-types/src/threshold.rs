//! Per-metric alert thresholds and anomaly evaluation.

use std::collections::BTreeMap;

use crate::{EntityKey, MetricSample};

/// Multiplier above which a threshold breach is critical rather than a warning.
pub const CRITICAL_FACTOR: f64 = 1.5;

/// Alert threshold and display unit for one metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Threshold {
    /// Value above which the metric is anomalous.
    pub threshold: f64,
    /// Display unit, possibly empty.
    #[cfg_attr(feature = "serde", serde(default))]
    pub unit: String,
}

impl Threshold {
    /// Create a threshold with a unit.
    pub fn new(threshold: f64, unit: impl Into<String>) -> Self {
        Self {
            threshold,
            unit: unit.into(),
        }
    }

    /// Classify a value against this threshold.
    pub fn severity(&self, value: f64) -> Option<Severity> {
        if value > self.threshold * CRITICAL_FACTOR {
            Some(Severity::Critical)
        } else if value > self.threshold {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

/// Severity of a threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Warning,
    Critical,
}

/// Immutable lookup table of metric name to threshold.
///
/// Built once at startup and shared read-only between request handlers.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ThresholdTable {
    entries: BTreeMap<String, Threshold>,
}

impl ThresholdTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the threshold for a metric.
    pub fn get(&self, metric: &str) -> Option<&Threshold> {
        self.entries.get(metric)
    }

    /// Check if a metric has a threshold.
    pub fn contains(&self, metric: &str) -> bool {
        self.entries.contains_key(metric)
    }

    /// Iterate over `(metric, threshold)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Threshold)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Number of configured metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no thresholds are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check one sample's numeric fields against the table.
    ///
    /// Results are ordered by metric name.
    pub fn evaluate(&self, sample: &MetricSample) -> Vec<Anomaly> {
        sample
            .numeric_fields()
            .filter_map(|(metric, value)| {
                let threshold = self.entries.get(metric)?;
                threshold.severity(value).map(|severity| Anomaly {
                    entity: sample.entity.clone(),
                    metric: metric.to_string(),
                    value,
                    threshold: threshold.threshold,
                    severity,
                })
            })
            .collect()
    }

    /// Check every sample, keeping sample order.
    pub fn evaluate_all<'a, I>(&self, samples: I) -> Vec<Anomaly>
    where
        I: IntoIterator<Item = &'a MetricSample>,
    {
        samples
            .into_iter()
            .flat_map(|sample| self.evaluate(sample))
            .collect()
    }
}

impl FromIterator<(String, Threshold)> for ThresholdTable {
    fn from_iter<T: IntoIterator<Item = (String, Threshold)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A metric value above its configured threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub entity: EntityKey,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Anomaly {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entity.len() + 4))?;
        self.entity.serialize_entries(&mut map)?;
        map.serialize_entry("metric", &self.metric)?;
        map.serialize_entry("value", &self.value)?;
        map.serialize_entry("threshold", &self.threshold)?;
        map.serialize_entry("severity", &self.severity)?;
        map.end()
    }
}
