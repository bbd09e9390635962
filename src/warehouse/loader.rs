//! Warehouse load stage
//!
//! Reads a transformed CSV, ensures the raw table exists (fixed DDL,
//! `CREATE TABLE IF NOT EXISTS` — an existing table's schema is never
//! altered, so drift surfaces as an insert error), appends every row, and
//! replaces the two derived views. Loading is append-only: re-running on
//! the same file duplicates rows.

use crate::error::{Error, Result};
use crate::output::files::read_csv;
use crate::table::{cell_to_json, TIMESTAMP_FORMAT};
use crate::warehouse::{Session, WarehouseConfig};
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Loader parameters (file plus target object names)
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Transformed CSV to load
    pub file: PathBuf,
    /// Raw table name
    pub raw_table: String,
    /// Pass-through view name
    pub transformed_view: String,
    /// Aggregation view name
    pub final_view: String,
}

/// Outcome of one load run
#[derive(Debug)]
pub struct LoadSummary {
    /// Rows accepted by the bulk insert
    pub rows_loaded: usize,
}

/// Run the full load: read file, connect, ensure table, insert, replace views
///
/// The session is closed on every exit path; a logout failure is logged
/// and never overrides the primary result.
pub async fn load(config: &WarehouseConfig, options: &LoadOptions) -> Result<LoadSummary> {
    let batch = read_table(options)?;
    info!(
        "Read {} rows from {}",
        batch.num_rows(),
        options.file.display()
    );

    let session = Session::connect(config).await?;
    info!("Connected to warehouse account {}", config.account);

    let result = run_load(&session, &batch, options).await;
    if let Err(e) = session.close().await {
        warn!("Failed to close warehouse session: {e}");
    }
    result
}

async fn run_load(
    session: &Session,
    batch: &RecordBatch,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    ensure_raw_table(session, &options.raw_table).await?;
    let rows_loaded = insert_rows(session, batch, &options.raw_table).await?;
    replace_views(session, options).await?;
    Ok(LoadSummary { rows_loaded })
}

/// Read the CSV and normalize a textual `fetched_at` column to timestamps
fn read_table(options: &LoadOptions) -> Result<RecordBatch> {
    let batch = read_csv(&options.file)?;
    normalize_fetched_at(batch)
}

fn normalize_fetched_at(batch: RecordBatch) -> Result<RecordBatch> {
    let Ok(idx) = batch.schema().index_of("fetched_at") else {
        return Ok(batch);
    };

    match batch.schema().field(idx).data_type() {
        DataType::Timestamp(_, _) => Ok(batch),
        // A header-only file infers as Null: nothing to parse
        DataType::Null => {
            retype_fetched_at(&batch, idx, vec![None; batch.num_rows()])
        }
        DataType::Utf8 => {
            let strings = batch
                .column(idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::format("fetched_at", "column is not a string array"))?;

            let mut parsed: Vec<Option<i64>> = Vec::with_capacity(strings.len());
            for row in 0..strings.len() {
                if strings.is_null(row) {
                    parsed.push(None);
                    continue;
                }
                let raw = strings.value(row);
                let micros = parse_timestamp(raw).ok_or_else(|| {
                    Error::format("fetched_at", format!("unparsable value '{raw}' at row {row}"))
                })?;
                parsed.push(Some(micros));
            }

            retype_fetched_at(&batch, idx, parsed)
        }
        other => Err(Error::format(
            "fetched_at",
            format!("expected text or timestamp, found {other}"),
        )),
    }
}

/// Rebuild the batch with `fetched_at` as a microsecond timestamp column
fn retype_fetched_at(
    batch: &RecordBatch,
    idx: usize,
    parsed: Vec<Option<i64>>,
) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields[idx] = Field::new(
        "fetched_at",
        DataType::Timestamp(TimeUnit::Microsecond, None),
        true,
    );
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns[idx] = Arc::new(TimestampMicrosecondArray::from(parsed));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Error::from)
}

/// Parse the writer's timestamp format plus common fallbacks
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(dt.and_utc().timestamp_micros());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_micros());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_micros());
    }
    None
}

/// Create the raw table if it does not exist
async fn ensure_raw_table(session: &Session, raw_table: &str) -> Result<()> {
    session.execute(&raw_table_ddl(raw_table)).await?;
    Ok(())
}

fn raw_table_ddl(raw_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {raw_table} (\n\
         \x20   POST_ID INTEGER,\n\
         \x20   USER_ID INTEGER,\n\
         \x20   TITLE STRING,\n\
         \x20   BODY STRING,\n\
         \x20   TITLE_LENGTH INTEGER,\n\
         \x20   BODY_LENGTH INTEGER,\n\
         \x20   FETCHED_AT TIMESTAMP_NTZ\n\
         )"
    )
}

/// Append every row of the batch to the raw table
///
/// Column names are upper-cased; a partial insert fails with the
/// attempted/accepted counts.
async fn insert_rows(session: &Session, batch: &RecordBatch, raw_table: &str) -> Result<usize> {
    let attempted = batch.num_rows();
    if attempted == 0 {
        info!("No rows to load into {raw_table}");
        return Ok(0);
    }

    let sql = build_insert(batch, raw_table)?;
    let data = session.execute(&sql).await?;

    let loaded = usize::try_from(data.returned.unwrap_or(0)).unwrap_or(0);
    if loaded != attempted {
        return Err(Error::Load { attempted, loaded });
    }
    info!("Loaded {loaded} rows into {raw_table}");
    Ok(loaded)
}

/// Build one multi-row INSERT statement from a batch
fn build_insert(batch: &RecordBatch, raw_table: &str) -> Result<String> {
    let columns: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_uppercase())
        .collect();

    let mut rows: Vec<String> = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut values: Vec<String> = Vec::with_capacity(batch.num_columns());
        for column in batch.columns() {
            values.push(sql_literal(&cell_to_json(column.as_ref(), row)?));
        }
        rows.push(format!("({})", values.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {raw_table} ({}) VALUES {}",
        columns.join(", "),
        rows.join(", ")
    ))
}

/// Render a JSON cell as a SQL literal
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Drop-and-recreate both derived views
///
/// Each replacement is atomic on its own; the two are not wrapped in a
/// transaction, so a failure after the first leaves the second stale.
async fn replace_views(session: &Session, options: &LoadOptions) -> Result<()> {
    session
        .execute(&transformed_view_ddl(
            &options.transformed_view,
            &options.raw_table,
        ))
        .await?;
    session
        .execute(&final_view_ddl(&options.final_view, &options.raw_table))
        .await?;
    info!(
        "Replaced views {} and {}",
        options.transformed_view, options.final_view
    );
    Ok(())
}

fn transformed_view_ddl(view: &str, raw_table: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {view} AS\n\
         SELECT POST_ID, USER_ID, TITLE, BODY, TITLE_LENGTH, BODY_LENGTH, FETCHED_AT\n\
         FROM {raw_table}"
    )
}

fn final_view_ddl(view: &str, raw_table: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {view} AS\n\
         SELECT USER_ID, COUNT(*) AS POSTS_COUNT, AVG(BODY_LENGTH) AS AVG_BODY_LENGTH\n\
         FROM {raw_table}\n\
         GROUP BY USER_ID"
    )
}
