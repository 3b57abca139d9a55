//! # opswatch-adapters
//!
//! Query engines for opswatch. A query engine runs a Flux query against a
//! time-series store and hands back the result as ordered [`RawRow`]s; it
//! knows nothing about metrics, entities or thresholds.
//!
//! ## Supported Stores
//!
//! - **InfluxDB 2.x** (`influx` feature, on by default) - queries the
//!   `/api/v2/query` HTTP endpoint and decodes the annotated CSV response
//! - **Static** - canned responses for tests and demos
//!
//! ## Quick Start (InfluxDB)
//!
//! ```rust,no_run
//! use opswatch_adapters::influx::InfluxClient;
//! use opswatch_adapters::QueryEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = InfluxClient::builder()
//!         .endpoint("http://localhost:8086")
//!         .org("aiops")
//!         .token("my-token")
//!         .build()?;
//!
//!     let rows = client
//!         .query(r#"from(bucket: "metrics") |> range(start: -5m) |> last()"#)
//!         .await?;
//!
//!     println!("Fetched {} rows", rows.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

pub mod error;
pub mod retry;
pub mod memory;

#[cfg(feature = "influx")]
pub mod annotated_csv;

#[cfg(feature = "influx")]
pub mod influx;

pub use error::QueryError;
pub use memory::StaticEngine;
pub use retry::RetryPolicy;

// Re-export types for convenience
pub use opswatch_types::{ColumnValue, RawRow};

/// A store that can execute a Flux query and return tabular rows.
///
/// Rows come back in the order the store produced them, tables flattened
/// one after another. Implementations must be safe to share between
/// request handlers.
#[async_trait]
pub trait QueryEngine: Send + Sync + std::fmt::Debug {
    /// Run a query and return every result row.
    async fn query(&self, flux: &str) -> Result<Vec<RawRow>, QueryError>;

    /// Short description for logs, e.g. the endpoint URL.
    fn description(&self) -> &str;
}
