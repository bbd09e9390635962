//! Local file writers and reader
//!
//! Raw records are persisted twice: verbatim pretty-printed JSON (UTF-8,
//! non-ASCII left unescaped) and a CSV re-serialization whose header is the
//! field names exactly as they arrived. The transformed table is written as
//! CSV with the renamed columns. Writers create their target directory and
//! overwrite existing files; there is no versioning.

use crate::error::{Error, Result};
use crate::table::{self, TIMESTAMP_FORMAT};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Raw JSON file name
pub const RAW_JSON_FILE: &str = "posts.json";
/// Raw CSV file name
pub const RAW_CSV_FILE: &str = "posts.csv";
/// Transformed CSV file name
pub const TRANSFORMED_CSV_FILE: &str = "posts_transformed.csv";

/// Persist the fetched batch verbatim as JSON and CSV
pub fn write_raw(records: &[Value], dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;

    let json_path = dir.join(RAW_JSON_FILE);
    let json = serde_json::to_string_pretty(records)?;
    fs::write(&json_path, json)?;
    info!("Saved raw JSON to {}", json_path.display());

    let csv_path = dir.join(RAW_CSV_FILE);
    let batch = table::records_to_batch(records)?;
    write_csv(&batch, &csv_path)?;
    info!("Saved raw CSV to {}", csv_path.display());

    Ok((json_path, csv_path))
}

/// Persist the transformed table as CSV
pub fn write_transformed(batch: &RecordBatch, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(TRANSFORMED_CSV_FILE);
    write_csv(batch, &path)?;
    info!("Saved transformed CSV to {}", path.display());
    Ok(path)
}

/// Write a batch to a CSV file with a header row
fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_timestamp_format(TIMESTAMP_FORMAT.to_string())
        .build(file);
    writer.write(batch)?;
    Ok(())
}

/// Read a CSV file back into a single batch, inferring column types
pub fn read_csv(path: &Path) -> Result<RecordBatch> {
    let mut file = File::open(path)
        .map_err(|e| Error::Other(format!("cannot open {}: {e}", path.display())))?;

    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(&mut file, None)
        .map_err(|e| Error::parse(format!("cannot infer schema of {}: {e}", path.display())))?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .build(file)?;
    let batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>()?;

    Ok(arrow::compute::concat_batches(&schema, &batches)?)
}
