//! JSON to Arrow conversion
//!
//! The pipeline's tabular structure is an Arrow [`RecordBatch`]. This module
//! converts fetched JSON records into batches (column order follows the order
//! fields arrived in, which `serde_json`'s preserve_order feature keeps
//! intact) and extracts single cells back out as JSON values.

use crate::error::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use serde_json::Value;
use std::sync::Arc;

/// Timestamp format used for CSV output and SQL literals
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Convert JSON records to an Arrow RecordBatch
///
/// The schema is taken from the first record: one column per key, in
/// arrival order, with the type merged across all records. Fields are
/// nullable since later records may omit keys.
pub fn records_to_batch(records: &[Value]) -> Result<RecordBatch> {
    let schema = infer_ordered_schema(records);

    if records.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(schema)));
    }

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let values: Vec<Option<&Value>> = records
            .iter()
            .map(|record| record.as_object().and_then(|obj| obj.get(field.name())))
            .collect();
        columns.push(build_array(&values, field.data_type())?);
    }

    RecordBatch::try_new(Arc::new(schema), columns).map_err(Error::from)
}

/// Infer a schema with columns in first-record key order
fn infer_ordered_schema(records: &[Value]) -> Schema {
    let mut names: Vec<String> = Vec::new();
    let mut types: Vec<DataType> = Vec::new();

    for record in records {
        if let Value::Object(obj) = record {
            for (key, value) in obj {
                let inferred = infer_type(value);
                match names.iter().position(|n| n == key) {
                    Some(idx) => types[idx] = merge_types(&types[idx], &inferred),
                    None => {
                        names.push(key.clone());
                        types.push(inferred);
                    }
                }
            }
        }
    }

    let fields: Vec<Field> = names
        .into_iter()
        .zip(types)
        .map(|(name, dtype)| Field::new(name, dtype, true))
        .collect();
    Schema::new(fields)
}

/// Infer an Arrow DataType from a JSON value
///
/// Nested arrays and objects fall back to their string representation;
/// the posts dataset is flat so this only matters for foreign inputs.
pub(crate) fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) => {
            if n.is_i64() {
                DataType::Int64
            } else {
                DataType::Float64
            }
        }
        Value::String(_) | Value::Array(_) | Value::Object(_) => DataType::Utf8,
    }
}

/// Merge two data types into a compatible type
pub(crate) fn merge_types(type1: &DataType, type2: &DataType) -> DataType {
    match (type1, type2) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

/// Build an Arrow array from JSON values
pub(crate) fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values
                .iter()
                .map(|v| v.and_then(|v| v.as_f64().or_else(|| v.as_i64().map(|i| i as f64))))
                .collect();
            Ok(Arc::new(arr))
        }

        DataType::Utf8 => {
            let arr: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        _ => v.to_string(),
                    })
                })
                .collect();
            Ok(Arc::new(arr))
        }

        other => Err(Error::schema(format!(
            "unsupported column type for JSON conversion: {other}"
        ))),
    }
}

/// Extract one cell of a batch column as a JSON value
///
/// Timestamps come back as formatted strings so callers can embed them in
/// CSV or SQL without carrying Arrow types around.
pub fn cell_to_json(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    match array.data_type() {
        DataType::Null => Ok(Value::Null),

        DataType::Boolean => {
            let arr = downcast::<BooleanArray>(array)?;
            Ok(Value::Bool(arr.value(row)))
        }

        DataType::Int64 => {
            let arr = downcast::<Int64Array>(array)?;
            Ok(Value::Number(arr.value(row).into()))
        }

        DataType::Float64 => {
            let arr = downcast::<Float64Array>(array)?;
            Ok(serde_json::Number::from_f64(arr.value(row)).map_or(Value::Null, Value::Number))
        }

        DataType::Utf8 => {
            let arr = downcast::<StringArray>(array)?;
            Ok(Value::String(arr.value(row).to_string()))
        }

        DataType::Timestamp(unit, _) => {
            let datetime = match unit {
                TimeUnit::Second => {
                    DateTime::from_timestamp(downcast::<TimestampSecondArray>(array)?.value(row), 0)
                }
                TimeUnit::Millisecond => DateTime::from_timestamp_millis(
                    downcast::<TimestampMillisecondArray>(array)?.value(row),
                ),
                TimeUnit::Microsecond => DateTime::from_timestamp_micros(
                    downcast::<TimestampMicrosecondArray>(array)?.value(row),
                ),
                TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
                    downcast::<TimestampNanosecondArray>(array)?.value(row),
                )),
            }
            .ok_or_else(|| Error::format("timestamp", "value out of range"))?;
            Ok(Value::String(
                datetime.format(TIMESTAMP_FORMAT).to_string(),
            ))
        }

        other => Err(Error::schema(format!(
            "unsupported column type for cell extraction: {other}"
        ))),
    }
}

fn downcast<T: 'static>(array: &dyn Array) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::schema(format!(
            "column claims type {} but holds a different array",
            array.data_type()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_to_batch_preserves_arrival_order() {
        let records = vec![
            json!({"userId": 1, "id": 1, "title": "a", "body": "b"}),
            json!({"userId": 1, "id": 2, "title": "c", "body": "d"}),
        ];
        let batch = records_to_batch(&records).unwrap();

        let schema = batch.schema();
        let names: Vec<&str> = schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, vec!["userId", "id", "title", "body"]);
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn test_mixed_int_float_merges_to_float() {
        let records = vec![json!({"x": 1}), json!({"x": 1.5})];
        let batch = records_to_batch(&records).unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Float64);
    }

    #[test]
    fn test_missing_key_becomes_null() {
        let records = vec![json!({"a": 1, "b": "x"}), json!({"a": 2})];
        let batch = records_to_batch(&records).unwrap();
        let col = batch.column(1);
        assert!(col.is_null(1));
        assert_eq!(cell_to_json(col.as_ref(), 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_records_yield_empty_batch() {
        let batch = records_to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn test_cell_roundtrip() {
        let records = vec![json!({"n": 7, "s": "hi", "f": 2.5, "flag": true})];
        let batch = records_to_batch(&records).unwrap();

        assert_eq!(cell_to_json(batch.column(0).as_ref(), 0).unwrap(), json!(7));
        assert_eq!(
            cell_to_json(batch.column(1).as_ref(), 0).unwrap(),
            json!("hi")
        );
        assert_eq!(
            cell_to_json(batch.column(2).as_ref(), 0).unwrap(),
            json!(2.5)
        );
        assert_eq!(
            cell_to_json(batch.column(3).as_ref(), 0).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_timestamp_cell_formats() {
        let arr = TimestampMicrosecondArray::from(vec![Some(1_700_000_000_000_000i64)]);
        let value = cell_to_json(&arr, 0).unwrap();
        assert_eq!(value, json!("2023-11-14T22:13:20.000000"));
    }
}
