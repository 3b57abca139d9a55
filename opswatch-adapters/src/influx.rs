//! InfluxDB 2.x query engine using the HTTP query API.
//!
//! Queries are POSTed to `/api/v2/query` as Flux and the annotated CSV
//! response is decoded into [`RawRow`]s. Every call runs under the client
//! timeout and the configured [`RetryPolicy`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use opswatch_adapters::influx::InfluxClient;
//! use opswatch_adapters::{QueryEngine, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = InfluxClient::builder()
//!         .endpoint("http://influxdb:8086")
//!         .org("aiops")
//!         .token("secret")
//!         .timeout(Duration::from_secs(5))
//!         .retry(RetryPolicy::default())
//!         .build()?;
//!
//!     if !client.health().await? {
//!         eprintln!("store is not ready yet");
//!     }
//!
//!     let rows = client.query(r#"buckets()"#).await?;
//!     for row in &rows {
//!         println!("{:?}", row.get("name"));
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{annotated_csv, QueryEngine, QueryError, RawRow, RetryPolicy};

/// InfluxDB 2.x client implementing [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: Client,
    endpoint: String,
    org: String,
    token: String,
    retry: RetryPolicy,
}

impl InfluxClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> InfluxClientBuilder {
        InfluxClientBuilder::default()
    }

    /// The base URL queries are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check whether the store reports itself healthy.
    ///
    /// Returns `Ok(false)` when the store answers but is not ready; transport
    /// failures are errors.
    pub async fn health(&self) -> Result<bool, QueryError> {
        let url = format!("{}/health", self.endpoint);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Parse(e.to_string()))?;

        Ok(health.status == "pass")
    }

    async fn query_once(&self, flux: &str) -> Result<Vec<RawRow>, QueryError> {
        let url = format!("{}/api/v2/query", self.endpoint);

        let response = self
            .client
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
            .header(reqwest::header::ACCEPT, "application/csv")
            .json(&QueryRequest::flux(flux))
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(QueryError::Auth(error_message(response).await));
        }

        if !status.is_success() {
            return Err(QueryError::Http(format!(
                "API returned status {}: {}",
                status,
                error_message(response).await
            )));
        }

        let body = response.text().await?;
        annotated_csv::decode(&body)
    }
}

#[async_trait]
impl QueryEngine for InfluxClient {
    async fn query(&self, flux: &str) -> Result<Vec<RawRow>, QueryError> {
        debug!(endpoint = %self.endpoint, "running flux query");
        self.retry.run(|| self.query_once(flux)).await
    }

    fn description(&self) -> &str {
        &self.endpoint
    }
}

/// Builder for InfluxClient.
#[derive(Debug, Default)]
pub struct InfluxClientBuilder {
    endpoint: Option<String>,
    org: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl InfluxClientBuilder {
    /// Set the server URL (e.g., "http://localhost:8086").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the organization queries run under.
    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// Set the API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry policy (default: one retry after 250ms).
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<InfluxClient, QueryError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Connection(format!("failed to build HTTP client: {}", e)))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8086".to_string());

        Ok(InfluxClient {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            org: self.org.unwrap_or_default(),
            token: self.token.unwrap_or_default(),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Body of a `/api/v2/query` request.
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

impl<'a> QueryRequest<'a> {
    fn flux(query: &'a str) -> Self {
        Self {
            query,
            kind: "flux",
            dialect: Dialect::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Dialect {
    header: bool,
    annotations: [&'static str; 3],
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            annotations: ["datatype", "group", "default"],
        }
    }
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => serde_json::from_str::<ApiError>(&body)
            .ok()
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| if body.is_empty() { status.to_string() } else { body }),
        Err(_) => status.to_string(),
    }
}
