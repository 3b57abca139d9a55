//! Latest LLM-generated narrative text.

use std::fmt;
use std::time::Duration;

use opswatch_adapters::{QueryEngine, QueryError};
use tracing::debug;

use super::query::LatestTextQuery;

/// Text served while no narrative is available.
pub const WAITING_SENTINEL: &str = "Waiting for LLM analysis...";

/// Which narrative stream to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrativeCategory {
    /// Remediation plans from the planner service.
    Planner,
    /// Findings from the analyzer service.
    Analysis,
}

impl NarrativeCategory {
    /// Default measurement name for this category.
    pub fn measurement(&self) -> &'static str {
        match self {
            NarrativeCategory::Planner => "llm_planner",
            NarrativeCategory::Analysis => "llm_analysis",
        }
    }
}

impl fmt::Display for NarrativeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.measurement())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Nothing was written within the window.
    NoRows,
    /// The latest record carries no value.
    NullValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    Found(String),
    NotFound(NotFoundReason),
}

impl Narrative {
    /// The text to show, or [`WAITING_SENTINEL`].
    pub fn into_text(self) -> String {
        match self {
            Narrative::Found(text) => text,
            Narrative::NotFound(_) => WAITING_SENTINEL.to_string(),
        }
    }
}

/// Reads the latest narrative of a category within a lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeFetcher {
    pub bucket: String,
    pub field: String,
    pub window: Duration,
    pub planner_measurement: String,
    pub analysis_measurement: String,
}

impl NarrativeFetcher {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            field: "response".to_string(),
            window: Duration::from_secs(24 * 60 * 60),
            planner_measurement: NarrativeCategory::Planner.measurement().to_string(),
            analysis_measurement: NarrativeCategory::Analysis.measurement().to_string(),
        }
    }

    pub fn query(&self, category: NarrativeCategory) -> LatestTextQuery {
        let measurement = match category {
            NarrativeCategory::Planner => &self.planner_measurement,
            NarrativeCategory::Analysis => &self.analysis_measurement,
        };

        LatestTextQuery {
            bucket: self.bucket.clone(),
            measurement: measurement.clone(),
            field: self.field.clone(),
            window: self.window,
        }
    }

    /// Fetch the latest narrative. Absence is not an error.
    pub async fn fetch(
        &self,
        engine: &dyn QueryEngine,
        category: NarrativeCategory,
    ) -> Result<Narrative, QueryError> {
        let rows = engine.query(&self.query(category).render()).await?;

        let narrative = match rows.first() {
            None => Narrative::NotFound(NotFoundReason::NoRows),
            Some(row) => match row.get("_value") {
                None => Narrative::NotFound(NotFoundReason::NullValue),
                Some(value) if value.is_null() => Narrative::NotFound(NotFoundReason::NullValue),
                Some(value) => Narrative::Found(value.to_string()),
            },
        };

        debug!(category = %category, found = matches!(narrative, Narrative::Found(_)), "narrative fetched");
        Ok(narrative)
    }
}
