//! Pipeline configuration
//!
//! Fixed endpoint and local data locations for the extract/transform stage.
//! Warehouse credentials live in [`crate::warehouse::WarehouseConfig`].

use std::path::PathBuf;
use std::time::Duration;

/// Default API endpoint serving the complete posts dataset in one response
pub const DEFAULT_API_URL: &str = "https://jsonplaceholder.typicode.com/posts";

/// Default request timeout for the single fetch call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the extract/transform stage
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Endpoint to fetch posts from
    pub api_url: String,
    /// Request timeout for the fetch call
    pub timeout: Duration,
    /// Directory for verbatim raw copies
    pub raw_dir: PathBuf,
    /// Directory for the transformed table
    pub transformed_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            raw_dir: PathBuf::from("data").join("raw"),
            transformed_dir: PathBuf::from("data").join("transformed"),
        }
    }
}

impl PipelineConfig {
    /// Create a config rooted at a custom data directory
    ///
    /// Raw files go to `{data_dir}/raw`, transformed files to
    /// `{data_dir}/transformed`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            raw_dir: data_dir.join("raw"),
            transformed_dir: data_dir.join("transformed"),
            ..Self::default()
        }
    }

    /// Override the API endpoint
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}
