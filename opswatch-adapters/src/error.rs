//! Error types for query engines.

use thiserror::Error;

/// Errors that can occur when running a query against the time-series store.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The store answered with a non-2xx status other than 401/403.
    #[error("store returned an error: {0}")]
    Http(String),

    /// The annotated CSV body could not be decoded.
    #[error("malformed query result: {0}")]
    Parse(String),

    /// The API token was rejected or lacks read access to the bucket.
    #[error("store rejected credentials: {0}")]
    Auth(String),

    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Connection(String),

    /// No answer within the client timeout.
    #[error("store did not answer in time")]
    Timeout,

    /// Flux compile or runtime error, reported in-band.
    #[error("flux query failed: {0}")]
    Query(String),
}

impl QueryError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts and connection failures are transient; everything else
    /// will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Timeout | QueryError::Connection(_))
    }
}

#[cfg(feature = "influx")]
impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout
        } else if err.is_connect() {
            QueryError::Connection(err.to_string())
        } else {
            QueryError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "influx")]
impl From<csv::Error> for QueryError {
    fn from(err: csv::Error) -> Self {
        QueryError::Parse(err.to_string())
    }
}
