//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Posts ETL pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "posts-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch posts, save raw copies, transform, save transformed CSV
    Run {
        /// API endpoint to fetch from
        #[arg(long)]
        api_url: Option<String>,

        /// Base data directory (raw/ and transformed/ live underneath)
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Load a transformed CSV into the warehouse and replace the views
    Load {
        /// Local transformed CSV file
        #[arg(long)]
        file: PathBuf,

        /// Raw table name
        #[arg(long, alias = "raw_table", default_value = "RAW_POSTS")]
        raw_table: String,

        /// Pass-through view name
        #[arg(long, alias = "transformed_view", default_value = "TRANSFORMED_POSTS_VIEW")]
        transformed_view: String,

        /// Aggregation view name
        #[arg(long, alias = "final_view", default_value = "FINAL_POSTS_VIEW")]
        final_view: String,
    },

    /// Upload a local file to an S3 bucket
    Upload {
        /// Local file to upload
        #[arg(long)]
        file: PathBuf,

        /// Bucket name
        #[arg(long)]
        bucket: String,

        /// Object key (default: same basename)
        #[arg(long)]
        key: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let cli = Cli::parse_from(["posts-etl", "load", "--file", "out.csv"]);
        match cli.command {
            Commands::Load {
                file,
                raw_table,
                transformed_view,
                final_view,
            } => {
                assert_eq!(file, PathBuf::from("out.csv"));
                assert_eq!(raw_table, "RAW_POSTS");
                assert_eq!(transformed_view, "TRANSFORMED_POSTS_VIEW");
                assert_eq!(final_view, "FINAL_POSTS_VIEW");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_load_accepts_underscore_flag_spellings() {
        let cli = Cli::parse_from([
            "posts-etl",
            "load",
            "--file",
            "out.csv",
            "--raw_table",
            "MY_TABLE",
            "--transformed_view",
            "MY_TV",
            "--final_view",
            "MY_FV",
        ]);
        match cli.command {
            Commands::Load {
                raw_table,
                transformed_view,
                final_view,
                ..
            } => {
                assert_eq!(raw_table, "MY_TABLE");
                assert_eq!(transformed_view, "MY_TV");
                assert_eq!(final_view, "MY_FV");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_upload_requires_bucket() {
        let result = Cli::try_parse_from(["posts-etl", "upload", "--file", "out.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_key_is_optional() {
        let cli = Cli::parse_from(["posts-etl", "upload", "--file", "a.csv", "--bucket", "b"]);
        match cli.command {
            Commands::Upload { key, .. } => assert!(key.is_none()),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
