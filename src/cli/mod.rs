//! Command-line interface
//!
//! Each subcommand is one independently invocable pipeline stage; stages
//! hand off exclusively through files on disk.

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
