//! Warehouse connection configuration
//!
//! Credentials are read from the environment exactly once, at process
//! start, into an explicit struct that is passed by reference into the
//! loader. Nothing deeper in the call tree touches the environment.

use crate::error::{Error, Result};

/// Connection parameters for the warehouse
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Login name
    pub user: String,
    /// Password (static credential auth only)
    pub password: String,
    /// Account identifier, e.g. `xy12345.eu-west-1`
    pub account: String,
    /// Virtual warehouse to run statements on
    pub warehouse: String,
    /// Target database
    pub database: String,
    /// Target schema
    pub schema: String,
    /// Optional role
    pub role: Option<String>,
}

impl WarehouseConfig {
    /// Build the config from `SNOWFLAKE_*` environment variables
    ///
    /// All parameters except the role are required; the first absent one
    /// fails the run.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            user: required("SNOWFLAKE_USER")?,
            password: required("SNOWFLAKE_PASSWORD")?,
            account: required("SNOWFLAKE_ACCOUNT")?,
            warehouse: required("SNOWFLAKE_WAREHOUSE")?,
            database: required("SNOWFLAKE_DATABASE")?,
            schema: required("SNOWFLAKE_SCHEMA")?,
            role: std::env::var("SNOWFLAKE_ROLE").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Base URL of the account's REST endpoint
    pub fn base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.account)
    }
}

fn required(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::missing_env(var)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WarehouseConfig {
        WarehouseConfig {
            user: "etl".into(),
            password: "secret".into(),
            account: "xy12345.eu-west-1".into(),
            warehouse: "COMPUTE_WH".into(),
            database: "ANALYTICS".into(),
            schema: "PUBLIC".into(),
            role: None,
        }
    }

    #[test]
    fn test_base_url_uses_account() {
        let config = test_config();
        assert_eq!(
            config.base_url(),
            "https://xy12345.eu-west-1.snowflakecomputing.com"
        );
    }
}
