//! # opswatch
//!
//! Dashboard API for live infrastructure metrics, LLM-generated narratives
//! and per-metric alert thresholds, backed by InfluxDB 2.x.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          server                              │
//! │   /api/metrics   /api/anomalies   /api/planning   /api/...   │
//! └──────┬──────────────────┬───────────────┬────────────────────┘
//!        │                  │               │
//!        ▼                  ▼               ▼
//!  LiveMetricsQuery   ThresholdProvider  NarrativeFetcher
//!        │                                  │
//!        ▼                                  ▼
//!  QueryEngine ──▶ RawRow ──▶ MetricRowShaper ──▶ MetricSample
//! ```
//!
//! - **[`data`]**: query builders, the row shaper, thresholds and narratives
//! - **[`server`]**: the hyper HTTP/1 API surface
//! - **[`settings`]**: layered service configuration
//!
//! The query engines live in `opswatch-adapters`; the shared data types in
//! `opswatch-types`.

pub mod data;
pub mod server;
pub mod settings;

pub use data::{
    is_metadata_column, ConfigError, MetricRowShaper, Narrative, NarrativeCategory,
    NarrativeFetcher, ThresholdProvider,
};
pub use server::AppState;
pub use settings::Settings;
