//! # posts-etl
//!
//! A small batch ETL pipeline:
//!
//! 1. fetch JSON posts from a public HTTP API,
//! 2. persist raw copies (pretty JSON + CSV) under `data/raw/`,
//! 3. transform into an Arrow table (renamed columns, trimmed text, derived
//!    length columns, one fetch timestamp per batch) saved as CSV under
//!    `data/transformed/`,
//! 4. optionally load a transformed CSV into a Snowflake raw table and
//!    replace two derived views,
//! 5. optionally upload any local file to S3.
//!
//! Stages are independently invocable subcommands; all hand-off between
//! them is file-based. Every stage runs as one straight-line sequence of
//! blocking-in-effect calls: no concurrency, no retries, no recovery —
//! failures abort the run, except the uploader which reports `false`.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

/// Error types for the pipeline
pub mod error;

/// Pipeline configuration (endpoint, timeout, data directories)
pub mod config;

/// HTTP fetch stage
pub mod fetch;

/// JSON to Arrow conversion
pub mod table;

/// Transform stage
pub mod transform;

/// Local file and cloud outputs
pub mod output;

/// Warehouse loading
pub mod warehouse;

/// Command-line interface
pub mod cli;

pub use config::PipelineConfig;
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
