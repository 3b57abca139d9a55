//! # opswatch-types
//!
//! Core types shared by the opswatch crates. This crate defines the shapes
//! data takes on its way from the time-series store to the dashboard:
//!
//! - [`RawRow`]: one tabular result row exactly as the query engine produced it,
//!   an ordered list of `(column, value)` pairs with nullable cells
//! - [`MetricSample`]: one monitored entity after shaping, identity plus
//!   non-null metric fields
//! - [`ThresholdTable`]: per-metric alert thresholds and the [`Anomaly`]
//!   records produced by checking samples against them
//!
//! ## Features
//!
//! - `serde`: JSON serialization of samples, thresholds and anomalies in the
//!   flat shape the dashboard consumes
//!
//! ## Example
//!
//! ```rust
//! use opswatch_types::{ColumnValue, EntityKey, MetricSample, MetricValue, RawRow};
//!
//! let row = RawRow::new()
//!     .with("cluster", ColumnValue::Text("east".into()))
//!     .with("cpu", ColumnValue::Float(42.5));
//! assert_eq!(row.len(), 2);
//!
//! let sample = MetricSample::new(EntityKey::new().with("cluster", Some("east".into())))
//!     .with_field("cpu", MetricValue::Float(42.5));
//! assert_eq!(sample.field("cpu").and_then(MetricValue::as_f64), Some(42.5));
//! ```

mod row;
mod sample;
mod threshold;

pub use row::*;
pub use sample::*;
pub use threshold::*;
