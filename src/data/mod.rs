//! Data access and shaping for the dashboard API.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5m", "500ms")
//! - [`query`]: Flux query builders for live metrics and latest-text lookups
//! - [`shaper`]: Reshapes pivoted rows into [`MetricSample`]s
//! - [`thresholds`]: INI-backed per-metric thresholds ([`ThresholdProvider`])
//! - [`narrative`]: Latest planner/analysis text ([`NarrativeFetcher`])
//!
//! ## Data Flow
//!
//! ```text
//! LiveMetricsQuery::render()
//!        │
//!        ▼
//! QueryEngine::query() ──▶ Vec<RawRow>
//!        │
//!        ▼
//! MetricRowShaper::shape() ──▶ Vec<MetricSample>
//!        │
//!        └──▶ ThresholdTable::evaluate_all() ──▶ Vec<Anomaly>
//! ```
//!
//! [`MetricSample`]: opswatch_types::MetricSample

pub mod duration;
pub mod narrative;
pub mod query;
pub mod shaper;
pub mod thresholds;

pub use narrative::{Narrative, NarrativeCategory, NarrativeFetcher, NotFoundReason, WAITING_SENTINEL};
pub use query::{LatestTextQuery, LiveMetricsQuery};
pub use shaper::{is_metadata_column, MetricRowShaper};
pub use thresholds::{ConfigError, ThresholdProvider};
