//! Entity-centric metric samples produced by shaping raw rows.

use std::collections::BTreeMap;
use std::fmt;

use crate::ColumnValue;

/// A present (non-null) metric field value.
///
/// There is no null variant: once a row is shaped every field holds a value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Float(f64),
    Integer(i64),
    Unsigned(u64),
    Bool(bool),
    Text(String),
}

impl MetricValue {
    /// Convert a raw cell, returning `None` for null cells.
    ///
    /// `NaN` and infinities have no JSON form and count as null. Timestamps
    /// become text.
    pub fn from_column(value: ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Null => None,
            ColumnValue::Float(v) if !v.is_finite() => None,
            ColumnValue::Float(v) => Some(MetricValue::Float(v)),
            ColumnValue::Integer(v) => Some(MetricValue::Integer(v)),
            ColumnValue::Unsigned(v) => Some(MetricValue::Unsigned(v)),
            ColumnValue::Bool(v) => Some(MetricValue::Bool(v)),
            ColumnValue::Text(s) | ColumnValue::Time(s) => Some(MetricValue::Text(s)),
        }
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Unsigned(v) => Some(*v as f64),
            MetricValue::Bool(_) | MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Unsigned(v) => write!(f, "{}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

/// Ordered identity of a monitored unit, e.g. `(cluster, container)`.
///
/// Each slot is an identity column that was present in the source row. A
/// slot is `None` when the column was present but null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EntityKey {
    parts: Vec<(String, Option<String>)>,
}

impl EntityKey {
    /// Create an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot, builder style.
    pub fn with(mut self, column: impl Into<String>, value: Option<String>) -> Self {
        self.push(column, value);
        self
    }

    /// Append a slot.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.parts.push((column.into(), value));
    }

    /// Value of an identity column. `None` if absent or unset.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Iterate over `(column, value)` slots in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.parts
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// True when every slot holds a value.
    pub fn is_complete(&self) -> bool {
        self.parts.iter().all(|(_, value)| value.is_some())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the key has no slots.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(value.as_deref().unwrap_or("?"))?;
        }
        Ok(())
    }
}

/// One monitored entity's latest observation, with metrics as named fields.
///
/// Serializes as a single flat object: identity columns first, then every
/// field. Field names are whatever the query returned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSample {
    /// Identity of the monitored unit.
    pub entity: EntityKey,
    /// Metric name to value. Keys are dynamic.
    pub fields: BTreeMap<String, MetricValue>,
}

impl MetricSample {
    /// Create a sample with no fields.
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: MetricValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value.
    pub fn field(&self, name: &str) -> Option<&MetricValue> {
        self.fields.get(name)
    }

    /// Iterate over fields that hold numbers.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.as_str(), v)))
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use serde::ser::{SerializeMap, Serializer};
    use serde::Serialize;

    use super::{EntityKey, MetricSample, MetricValue};

    impl Serialize for MetricValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                MetricValue::Float(v) => serializer.serialize_f64(*v),
                MetricValue::Integer(v) => serializer.serialize_i64(*v),
                MetricValue::Unsigned(v) => serializer.serialize_u64(*v),
                MetricValue::Bool(v) => serializer.serialize_bool(*v),
                MetricValue::Text(s) => serializer.serialize_str(s),
            }
        }
    }

    impl EntityKey {
        /// Write identity slots into an open map. Unset slots become `null`.
        pub(crate) fn serialize_entries<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
            for (column, value) in self.iter() {
                map.serialize_entry(column, &value)?;
            }
            Ok(())
        }
    }

    impl Serialize for EntityKey {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.len()))?;
            self.serialize_entries(&mut map)?;
            map.end()
        }
    }

    impl Serialize for MetricSample {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.entity.len() + self.fields.len()))?;
            self.entity.serialize_entries(&mut map)?;
            for (name, value) in &self.fields {
                map.serialize_entry(name, value)?;
            }
            map.end()
        }
    }
}
