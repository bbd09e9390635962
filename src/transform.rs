//! Transform stage
//!
//! Maps a fetched batch into the transformed table: renames `id`/`userId`,
//! trims the text fields, derives the two length columns, and stamps every
//! row with one timestamp captured at the start of the call.

use crate::error::{Error, Result};
use crate::table;
use arrow::array::{ArrayRef, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Fields every record must carry
const REQUIRED_FIELDS: [&str; 4] = ["id", "userId", "title", "body"];

/// Transform a fetched batch into the output table
///
/// Row order and column arrival order are preserved; renames happen in
/// place and the derived columns are appended. Unrecognized fields pass
/// through with inferred types.
pub fn transform(records: &[Value]) -> Result<RecordBatch> {
    if records.is_empty() {
        return Err(Error::schema("cannot transform an empty batch"));
    }
    validate(records)?;

    let mut fields: Vec<Field> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    let mut titles: Vec<String> = Vec::new();
    let mut bodies: Vec<String> = Vec::new();

    for key in &ordered_keys(records) {
        match key.as_str() {
            "id" => {
                fields.push(Field::new("post_id", DataType::Int64, false));
                columns.push(int_column(records, "id")?);
            }
            "userId" => {
                fields.push(Field::new("user_id", DataType::Int64, false));
                columns.push(int_column(records, "userId")?);
            }
            "title" => {
                titles = text_column(records, "title");
                fields.push(Field::new("title", DataType::Utf8, false));
                columns.push(Arc::new(StringArray::from(titles.clone())));
            }
            "body" => {
                bodies = text_column(records, "body");
                fields.push(Field::new("body", DataType::Utf8, false));
                columns.push(Arc::new(StringArray::from(bodies.clone())));
            }
            other => {
                let (field, column) = passthrough_column(records, other)?;
                fields.push(field);
                columns.push(column);
            }
        }
    }

    fields.push(Field::new("title_length", DataType::Int64, false));
    columns.push(char_count_column(&titles));
    fields.push(Field::new("body_length", DataType::Int64, false));
    columns.push(char_count_column(&bodies));

    // One timestamp per call: every row in the batch gets the same value
    let fetched_at = Utc::now().timestamp_micros();
    fields.push(Field::new(
        "fetched_at",
        DataType::Timestamp(TimeUnit::Microsecond, None),
        false,
    ));
    columns.push(Arc::new(TimestampMicrosecondArray::from(vec![
        fetched_at;
        records.len()
    ])));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    info!("Transformed {} records", batch.num_rows());
    Ok(batch)
}

/// Union of keys across all records, in first-seen order
///
/// A field may first appear on a record after the first one; it still
/// gets a column.
fn ordered_keys(records: &[Value]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(obj) = record {
            for key in obj.keys() {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.clone());
                }
            }
        }
    }
    keys
}

/// Check that every record is an object carrying the required fields
fn validate(records: &[Value]) -> Result<()> {
    for (idx, record) in records.iter().enumerate() {
        let obj = record
            .as_object()
            .ok_or_else(|| Error::schema(format!("record {idx} is not a JSON object")))?;
        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(Error::schema(format!(
                    "record {idx} is missing required field '{field}'"
                )));
            }
        }
    }
    Ok(())
}

/// Build an integer column from a required field
fn int_column(records: &[Value], key: &str) -> Result<ArrayRef> {
    let values: Vec<i64> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            record.get(key).and_then(Value::as_i64).ok_or_else(|| {
                Error::schema(format!("record {idx} field '{key}' is not an integer"))
            })
        })
        .collect::<Result<_>>()?;
    Ok(Arc::new(Int64Array::from(values)))
}

/// Coerce a required field to text and strip surrounding whitespace
fn text_column(records: &[Value], key: &str) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let value = match record.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            value.trim().to_string()
        })
        .collect()
}

/// Character counts of already-trimmed strings
fn char_count_column(values: &[String]) -> ArrayRef {
    let counts: Vec<i64> = values.iter().map(|s| s.chars().count() as i64).collect();
    Arc::new(Int64Array::from(counts))
}

/// Carry an unrecognized field through with an inferred type
fn passthrough_column(records: &[Value], key: &str) -> Result<(Field, ArrayRef)> {
    let values: Vec<Option<&Value>> = records.iter().map(|record| record.get(key)).collect();
    let dtype = values
        .iter()
        .flatten()
        .map(|v| table::infer_type(v))
        .reduce(|a, b| table::merge_types(&a, &b))
        .unwrap_or(DataType::Null);
    let column = table::build_array(&values, &dtype)?;
    Ok((Field::new(key, dtype, true), column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_batch() -> Vec<Value> {
        vec![
            json!({"userId": 7, "id": 1, "title": " Hi ", "body": " World "}),
            json!({"userId": 7, "id": 2, "title": "second", "body": "text"}),
            json!({"userId": 9, "id": 3, "title": "третий", "body": "тело"}),
        ]
    }

    fn string_at(batch: &RecordBatch, name: &str, row: usize) -> String {
        let idx = batch.schema().index_of(name).unwrap();
        let col = batch
            .column(idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .value(row)
            .to_string();
        col
    }

    fn int_at(batch: &RecordBatch, name: &str, row: usize) -> i64 {
        let idx = batch.schema().index_of(name).unwrap();
        batch
            .column(idx)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .value(row)
    }

    #[test]
    fn test_transform_renames_trims_and_derives() {
        let batch = transform(&sample_batch()).unwrap();

        let schema = batch.schema();
        let names: Vec<&str> = schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "user_id",
                "post_id",
                "title",
                "body",
                "title_length",
                "body_length",
                "fetched_at"
            ]
        );

        assert_eq!(int_at(&batch, "post_id", 0), 1);
        assert_eq!(int_at(&batch, "user_id", 0), 7);
        assert_eq!(string_at(&batch, "title", 0), "Hi");
        assert_eq!(string_at(&batch, "body", 0), "World");
        assert_eq!(int_at(&batch, "title_length", 0), 2);
        assert_eq!(int_at(&batch, "body_length", 0), 5);
    }

    #[test]
    fn test_transform_preserves_row_count_and_order() {
        let batch = transform(&sample_batch()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(int_at(&batch, "post_id", 0), 1);
        assert_eq!(int_at(&batch, "post_id", 1), 2);
        assert_eq!(int_at(&batch, "post_id", 2), 3);
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        let batch = transform(&sample_batch()).unwrap();
        // Cyrillic: chars, not UTF-8 bytes
        assert_eq!(int_at(&batch, "title_length", 2), 6);
        assert_eq!(int_at(&batch, "body_length", 2), 4);
    }

    #[test]
    fn test_all_rows_share_one_fetched_at() {
        let batch = transform(&sample_batch()).unwrap();
        let idx = batch.schema().index_of("fetched_at").unwrap();
        let col = batch
            .column(idx)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(col.value(0), col.value(1));
        assert_eq!(col.value(1), col.value(2));
    }

    #[test]
    fn test_empty_batch_is_schema_error() {
        let err = transform(&[]).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_missing_title_is_schema_error() {
        let records = vec![json!({"userId": 1, "id": 1, "body": "b"})];
        let err = transform(&records).unwrap_err();
        assert!(err.to_string().contains("missing required field 'title'"));
    }

    #[test]
    fn test_non_integer_id_is_schema_error() {
        let records = vec![json!({"userId": 1, "id": "one", "title": "t", "body": "b"})];
        let err = transform(&records).unwrap_err();
        assert!(err.to_string().contains("field 'id' is not an integer"));
    }

    #[test]
    fn test_numeric_title_is_coerced_to_text() {
        let records = vec![json!({"userId": 1, "id": 1, "title": 42, "body": " x "})];
        let batch = transform(&records).unwrap();
        assert_eq!(string_at(&batch, "title", 0), "42");
        assert_eq!(int_at(&batch, "title_length", 0), 2);
        assert_eq!(int_at(&batch, "body_length", 0), 1);
    }

    #[test]
    fn test_duplicate_post_ids_pass_through() {
        let records = vec![
            json!({"userId": 1, "id": 5, "title": "a", "body": "b"}),
            json!({"userId": 2, "id": 5, "title": "c", "body": "d"}),
        ];
        let batch = transform(&records).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(int_at(&batch, "post_id", 0), 5);
        assert_eq!(int_at(&batch, "post_id", 1), 5);
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let records = vec![json!({
            "userId": 1, "id": 1, "title": "t", "body": "b", "source": "api"
        })];
        let batch = transform(&records).unwrap();
        assert_eq!(string_at(&batch, "source", 0), "api");
    }

    #[test]
    fn test_extra_field_on_later_record_gets_a_column() {
        let records = vec![
            json!({"userId": 1, "id": 1, "title": "t", "body": "b"}),
            json!({"userId": 1, "id": 2, "title": "u", "body": "c", "tags": "x"}),
        ];
        let batch = transform(&records).unwrap();

        let idx = batch.schema().index_of("tags").unwrap();
        let col = batch
            .column(idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(col.is_null(0));
        assert_eq!(col.value(1), "x");
    }
}
