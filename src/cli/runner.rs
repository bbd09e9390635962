//! Command execution
//!
//! Dispatches subcommands and owns the exit-code policy: errors propagate
//! to `main` (exit 1); a failed upload is reported as a boolean and mapped
//! to exit 1 here.

use crate::cli::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::fetch::ApiClient;
use crate::output::{upload, write_raw, write_transformed};
use crate::transform::transform;
use crate::warehouse::{self, LoadOptions, WarehouseConfig};
use tracing::info;

/// Executes the parsed CLI command
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a runner for a parsed command line
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected stage
    pub async fn run(self) -> Result<()> {
        match self.cli.command {
            Commands::Run { api_url, data_dir } => {
                let mut config = PipelineConfig::with_data_dir(data_dir);
                if let Some(url) = api_url {
                    config = config.with_api_url(url);
                }
                run_pipeline(&config).await
            }

            Commands::Load {
                file,
                raw_table,
                transformed_view,
                final_view,
            } => {
                // Credentials are read once here and passed down by reference
                let config = WarehouseConfig::from_env()?;
                let options = LoadOptions {
                    file,
                    raw_table,
                    transformed_view,
                    final_view,
                };
                let summary = warehouse::load(&config, &options).await?;
                info!(
                    "Warehouse load and view creation complete ({} rows)",
                    summary.rows_loaded
                );
                Ok(())
            }

            Commands::Upload { file, bucket, key } => {
                if upload(&file, &bucket, key.as_deref()).await {
                    Ok(())
                } else {
                    Err(Error::Other(format!(
                        "upload of {} to bucket {bucket} failed",
                        file.display()
                    )))
                }
            }
        }
    }
}

/// Fetch, save raw copies, transform, save the transformed table
async fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let client = ApiClient::new(config)?;
    let records = client.fetch().await?;

    write_raw(&records, &config.raw_dir)?;

    let batch = transform(&records)?;
    write_transformed(&batch, &config.transformed_dir)?;

    info!("Done.");
    Ok(())
}
