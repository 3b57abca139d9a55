//! In-memory query engine with canned responses.
//!
//! Useful for tests and offline demos: responses are matched by a substring
//! of the incoming query, first match wins.
//!
//! ```rust
//! use opswatch_adapters::{ColumnValue, QueryEngine, RawRow, StaticEngine};
//!
//! # tokio_test::block_on(async {
//! let engine = StaticEngine::new("demo").respond(
//!     "mqtt_consumer",
//!     vec![RawRow::new().with("cpu", ColumnValue::Float(1.0))],
//! );
//!
//! let rows = engine.query(r#"filter(fn: (r) => r["_measurement"] == "mqtt_consumer")"#).await.unwrap();
//! assert_eq!(rows.len(), 1);
//! # });
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{QueryEngine, QueryError, RawRow};

#[derive(Debug, Clone)]
enum Canned {
    Rows(Vec<RawRow>),
    Fail(QueryError),
}

/// A query engine that answers from a fixed list of responses.
///
/// Queries that match nothing return no rows.
#[derive(Debug)]
pub struct StaticEngine {
    description: String,
    responses: Vec<(String, Canned)>,
    issued: Mutex<Vec<String>>,
}

impl StaticEngine {
    /// Create an engine with no responses.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            responses: Vec::new(),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Answer queries containing `pattern` with `rows`.
    pub fn respond(mut self, pattern: impl Into<String>, rows: Vec<RawRow>) -> Self {
        self.responses.push((pattern.into(), Canned::Rows(rows)));
        self
    }

    /// Fail queries containing `pattern` with `error`.
    pub fn fail(mut self, pattern: impl Into<String>, error: QueryError) -> Self {
        self.responses.push((pattern.into(), Canned::Fail(error)));
        self
    }

    /// Every query received so far, oldest first.
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl QueryEngine for StaticEngine {
    async fn query(&self, flux: &str) -> Result<Vec<RawRow>, QueryError> {
        self.issued.lock().push(flux.to_string());

        match self
            .responses
            .iter()
            .find(|(pattern, _)| flux.contains(pattern.as_str()))
        {
            Some((_, Canned::Rows(rows))) => Ok(rows.clone()),
            Some((_, Canned::Fail(error))) => Err(error.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnValue;

    #[tokio::test]
    async fn test_first_match_wins() {
        let engine = StaticEngine::new("test")
            .respond("llm_planner", vec![RawRow::new().with("_value", ColumnValue::Text("a".into()))])
            .respond("llm", vec![]);

        let rows = engine.query("llm_planner").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(engine.query("llm_analysis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_and_record() {
        let engine = StaticEngine::new("test").fail("boom", QueryError::Timeout);

        assert!(matches!(engine.query("boom").await, Err(QueryError::Timeout)));
        assert!(engine.query("other").await.unwrap().is_empty());
        assert_eq!(engine.issued(), vec!["boom".to_string(), "other".to_string()]);
        assert_eq!(engine.description(), "test");
    }
}
