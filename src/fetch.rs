//! HTTP fetch stage
//!
//! One synchronous-in-effect GET against the fixed posts endpoint. The
//! endpoint returns the complete dataset in a single JSON array, so there is
//! no pagination and, per the pipeline's abort-on-failure policy, no retry.

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Client for the posts API
pub struct ApiClient {
    client: Client,
    url: Url,
}

impl ApiClient {
    /// Create a client from pipeline configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Self::with_url_and_timeout(&config.api_url, config.timeout)
    }

    /// Create a client with an explicit endpoint and timeout
    pub fn with_url_and_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("posts-etl/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    /// Fetch the full batch of posts
    ///
    /// Returns the records in response order. Network failures and non-2xx
    /// statuses abort the run; the body must be a JSON array of objects.
    pub async fn fetch(&self) -> Result<Vec<Value>> {
        info!("Fetching data from {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} failed: {e}", self.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(Error::http_status(status.as_u16(), truncate(&body, 200)));
        }

        let records = parse_records(&body)?;
        info!("Fetched {} records", records.len());
        debug!("First record: {:?}", records.first());
        Ok(records)
    }
}

/// Parse a response body as a JSON array of objects
fn parse_records(body: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("response is not valid JSON: {e}")))?;

    let records = match value {
        Value::Array(arr) => arr,
        other => {
            return Err(Error::parse(format!(
                "expected a JSON array of records, got {}",
                type_name(&other)
            )))
        }
    };

    if let Some(idx) = records.iter().position(|r| !r.is_object()) {
        return Err(Error::parse(format!(
            "record {idx} is not a JSON object"
        )));
    }

    Ok(records)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= max)
            .unwrap_or(s.len());
        format!("{}...", &s[..end])
    }
}
