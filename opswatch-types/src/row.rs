//! Raw result rows as returned by the query engine.

use std::fmt;

/// A single decoded cell of a query result.
///
/// Cells keep the type announced by the engine. An empty cell with no
/// default is [`ColumnValue::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnValue {
    /// No value present.
    #[default]
    Null,
    /// 64-bit float (`double`).
    Float(f64),
    /// Signed integer (`long`).
    Integer(i64),
    /// Unsigned integer (`unsignedLong`).
    Unsigned(u64),
    /// Boolean.
    Bool(bool),
    /// Free text (`string` and any type not otherwise recognized).
    Text(String),
    /// Timestamp, kept as the RFC3339 text the engine sent.
    Time(String),
}

impl ColumnValue {
    /// Check if the cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("null"),
            ColumnValue::Float(v) => write!(f, "{}", v),
            ColumnValue::Integer(v) => write!(f, "{}", v),
            ColumnValue::Unsigned(v) => write!(f, "{}", v),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Text(s) | ColumnValue::Time(s) => f.write_str(s),
        }
    }
}

/// One result row: an ordered list of `(column name, value)` pairs.
///
/// Column order is the order the engine produced. Lookups are linear, rows
/// are narrow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    columns: Vec<(String, ColumnValue)>,
}

impl RawRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row from pre-built pairs.
    pub fn from_pairs(columns: Vec<(String, ColumnValue)>) -> Self {
        Self { columns }
    }

    /// Append a column, builder style.
    pub fn with(mut self, name: impl Into<String>, value: ColumnValue) -> Self {
        self.push(name, value);
        self
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, value: ColumnValue) {
        self.columns.push((name.into(), value));
    }

    /// Value of the first column with this name.
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in engine order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for RawRow {
    type Item = (String, ColumnValue);
    type IntoIter = std::vec::IntoIter<(String, ColumnValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_order() {
        let row = RawRow::new()
            .with("_time", ColumnValue::Time("2024-01-01T00:00:00Z".into()))
            .with("cluster", ColumnValue::Text("east".into()))
            .with("cpu", ColumnValue::Float(1.0));

        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["_time", "cluster", "cpu"]);
    }

    #[test]
    fn test_row_get() {
        let row = RawRow::new()
            .with("cpu", ColumnValue::Float(42.5))
            .with("memory", ColumnValue::Null);

        assert_eq!(row.get("cpu"), Some(&ColumnValue::Float(42.5)));
        assert_eq!(row.get("memory"), Some(&ColumnValue::Null));
        assert_eq!(row.get("disk"), None);
    }

    #[test]
    fn test_column_value_null() {
        assert!(ColumnValue::Null.is_null());
        assert!(ColumnValue::default().is_null());
        assert!(!ColumnValue::Bool(false).is_null());
    }

    #[test]
    fn test_column_value_display() {
        assert_eq!(ColumnValue::Float(42.5).to_string(), "42.5");
        assert_eq!(ColumnValue::Integer(-1).to_string(), "-1");
        assert_eq!(ColumnValue::Text("web-1".into()).to_string(), "web-1");
        assert_eq!(ColumnValue::Null.to_string(), "null");
    }
}
