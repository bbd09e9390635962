//! Warehouse loading (Snowflake)
//!
//! Reads a transformed CSV, ensures the raw table exists, appends all rows,
//! and replaces the two derived views. All statements run over one session
//! which is always closed on the way out.

pub mod client;
pub mod config;
pub mod loader;

pub use client::Session;
pub use config::WarehouseConfig;
pub use loader::{load, LoadOptions, LoadSummary};
