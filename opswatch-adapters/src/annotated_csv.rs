//! Decoder for InfluxDB annotated CSV.
//!
//! A query response is a sequence of tables. Each schema block starts with
//! annotation rows followed by a header row:
//!
//! ```text
//! #datatype,string,long,string,string,double
//! #group,false,false,true,true,false
//! #default,_result,,,,
//! ,result,table,cluster,container,cpu
//! ,,0,east,web-1,42.5
//! ```
//!
//! The first column only carries annotation markers and is dropped. Empty
//! cells take the `#default` value for their column, and are null if that is
//! empty too. Tables sharing a schema follow each other without repeating the
//! annotations.

use csv::{ReaderBuilder, StringRecord};

use crate::{ColumnValue, QueryError, RawRow};

/// Column types announced by the `#datatype` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    Double,
    Long,
    UnsignedLong,
    Boolean,
    DateTime,
    Text,
}

impl DataType {
    fn from_annotation(s: &str) -> Self {
        match s {
            "double" => DataType::Double,
            "long" => DataType::Long,
            "unsignedLong" => DataType::UnsignedLong,
            "boolean" => DataType::Boolean,
            s if s.starts_with("dateTime") => DataType::DateTime,
            // string, duration, base64Binary, and anything newer
            _ => DataType::Text,
        }
    }
}

/// Annotations and header for the current schema block.
#[derive(Debug, Default)]
struct Schema {
    datatypes: Vec<DataType>,
    defaults: Vec<String>,
    header: Option<Vec<String>>,
}

impl Schema {
    fn datatype(&self, index: usize) -> DataType {
        self.datatypes.get(index).copied().unwrap_or(DataType::Text)
    }

    fn default_for(&self, index: usize) -> &str {
        self.defaults.get(index).map(String::as_str).unwrap_or("")
    }

    /// Influx reports query failures in-band as an `error,reference` table.
    fn is_error_table(&self) -> bool {
        self.header
            .as_ref()
            .is_some_and(|h| h.iter().any(|c| c == "error") && h.iter().any(|c| c == "reference"))
    }
}

/// Decode an annotated CSV body into rows, in response order.
pub fn decode(body: &str) -> Result<Vec<RawRow>, QueryError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut schema = Schema::default();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let marker = record.get(0).unwrap_or("");

        if marker.starts_with('#') {
            let values = tail(&record);
            match marker {
                "#datatype" => {
                    schema = Schema {
                        datatypes: values.iter().map(|s| DataType::from_annotation(s)).collect(),
                        ..Schema::default()
                    };
                }
                "#default" => schema.defaults = values,
                // #group and unknown annotations carry nothing we need
                _ => {}
            }
            continue;
        }

        if record.iter().all(str::is_empty) {
            continue;
        }

        if schema.header.is_none() {
            schema.header = Some(tail(&record));
            continue;
        }
        let header = schema.header.as_deref().unwrap_or_default();

        if schema.is_error_table() {
            return Err(QueryError::Query(error_message(header, &record)));
        }

        rows.push(decode_row(&schema, header, &record)?);
    }

    Ok(rows)
}

fn decode_row(schema: &Schema, header: &[String], record: &StringRecord) -> Result<RawRow, QueryError> {
    let mut row = RawRow::new();

    for (index, name) in header.iter().enumerate() {
        let raw = record.get(index + 1).unwrap_or("");
        let raw = if raw.is_empty() { schema.default_for(index) } else { raw };
        let value = decode_cell(schema.datatype(index), raw).map_err(|e| {
            QueryError::Parse(format!("column '{}': {}", name, e))
        })?;
        row.push(name.clone(), value);
    }

    Ok(row)
}

fn decode_cell(datatype: DataType, raw: &str) -> Result<ColumnValue, String> {
    if raw.is_empty() {
        return Ok(ColumnValue::Null);
    }

    let value = match datatype {
        DataType::Double => ColumnValue::Float(raw.parse().map_err(|e| format!("{} ({})", e, raw))?),
        DataType::Long => ColumnValue::Integer(raw.parse().map_err(|e| format!("{} ({})", e, raw))?),
        DataType::UnsignedLong => {
            ColumnValue::Unsigned(raw.parse().map_err(|e| format!("{} ({})", e, raw))?)
        }
        DataType::Boolean => ColumnValue::Bool(raw.parse().map_err(|e| format!("{} ({})", e, raw))?),
        DataType::DateTime => ColumnValue::Time(raw.to_string()),
        DataType::Text => ColumnValue::Text(raw.to_string()),
    };

    Ok(value)
}

fn error_message(header: &[String], record: &StringRecord) -> String {
    header
        .iter()
        .position(|c| c == "error")
        .and_then(|i| record.get(i + 1))
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}

/// Record fields after the annotation column.
fn tail(record: &StringRecord) -> Vec<String> {
    record.iter().skip(1).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIVOTED: &str = "\
#datatype,string,long,string,string,double,double
#group,false,false,true,true,false,false
#default,_result,,,,,
,result,table,cluster,container,cpu,memory
,,0,east,web-1,42.5,
,,0,east,web-2,12,512.25
";

    #[test]
    fn test_decode_pivoted_rows() {
        let rows = decode(PIVOTED).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.get("result"), Some(&ColumnValue::Text("_result".into())));
        assert_eq!(first.get("table"), Some(&ColumnValue::Integer(0)));
        assert_eq!(first.get("cluster"), Some(&ColumnValue::Text("east".into())));
        assert_eq!(first.get("container"), Some(&ColumnValue::Text("web-1".into())));
        assert_eq!(first.get("cpu"), Some(&ColumnValue::Float(42.5)));
        assert_eq!(first.get("memory"), Some(&ColumnValue::Null));

        assert_eq!(rows[1].get("memory"), Some(&ColumnValue::Float(512.25)));
    }

    #[test]
    fn test_decode_keeps_column_order() {
        let rows = decode(PIVOTED).unwrap();
        let names: Vec<&str> = rows[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["result", "table", "cluster", "container", "cpu", "memory"]);
    }

    #[test]
    fn test_decode_multiple_schema_blocks() {
        let body = "\
#datatype,string,long,string,double
#group,false,false,true,false
#default,_result,,,
,result,table,container,cpu
,,0,web-1,1.5

#datatype,string,long,string,long
#group,false,false,true,false
#default,_result,,,
,result,table,container,restarts
,,1,web-1,3
";
        let rows = decode(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("cpu"), Some(&ColumnValue::Float(1.5)));
        assert_eq!(rows[1].get("restarts"), Some(&ColumnValue::Integer(3)));
        assert_eq!(rows[1].get("cpu"), None);
    }

    #[test]
    fn test_decode_text_and_time() {
        let body = "\
#datatype,string,long,dateTime:RFC3339,string,string,string
#group,false,false,false,false,true,true
#default,_result,,,,,
,result,table,_time,_value,_field,_measurement
,,0,2024-05-01T10:00:00Z,\"Scale web, then db\",response,llm_planner
";
        let rows = decode(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("_time"),
            Some(&ColumnValue::Time("2024-05-01T10:00:00Z".into()))
        );
        assert_eq!(
            rows[0].get("_value"),
            Some(&ColumnValue::Text("Scale web, then db".into()))
        );
    }

    #[test]
    fn test_decode_unsigned_and_bool() {
        let body = "\
#datatype,string,long,unsignedLong,boolean
#group,false,false,false,false
#default,_result,,,
,result,table,bytes,up
,,0,18446744073709551615,true
";
        let rows = decode(body).unwrap();
        assert_eq!(rows[0].get("bytes"), Some(&ColumnValue::Unsigned(u64::MAX)));
        assert_eq!(rows[0].get("up"), Some(&ColumnValue::Bool(true)));
    }

    #[test]
    fn test_decode_in_band_error() {
        let body = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,\"failed to initialize execute state: could not find bucket \"\"nope\"\"\",897
";
        let err = decode(body).unwrap_err();
        match err {
            QueryError::Query(msg) => assert!(msg.contains("could not find bucket")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_bad_number() {
        let body = "\
#datatype,string,long,double
#group,false,false,false
#default,_result,,
,result,table,cpu
,,0,not-a-number
";
        let err = decode(body).unwrap_err();
        assert!(matches!(err, QueryError::Parse(msg) if msg.contains("cpu")));
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_decode_without_annotations() {
        let body = ",result,table,cpu\n,_result,0,3.5\n";
        let rows = decode(body).unwrap();
        assert_eq!(rows[0].get("cpu"), Some(&ColumnValue::Text("3.5".into())));
    }
}
