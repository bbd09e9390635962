//! Minimal Snowflake REST session
//!
//! Speaks the connector wire protocol directly: `login-request` exchanges
//! static credentials for a session token, `query-request` runs one SQL
//! statement, `logout-request` releases the session. Just enough surface
//! for the loader; result-set paging and async query polling are not
//! implemented.

use crate::error::{Error, Result};
use crate::warehouse::WarehouseConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CLIENT_APP_ID: &str = "posts-etl";

/// An authenticated warehouse session
#[derive(Debug)]
pub struct Session {
    http: Client,
    base_url: Url,
    token: String,
    sequence: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    success: bool,
    message: Option<String>,
    data: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
struct AuthData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    success: bool,
    message: Option<String>,
    data: Option<QueryData>,
}

/// Result payload of one executed statement
#[derive(Debug, Default, Deserialize)]
pub struct QueryData {
    /// Result rows, absent for DDL
    pub rowset: Option<Vec<Vec<Value>>>,
    /// Total row count reported by the server (inserted or returned)
    pub returned: Option<i64>,
}

impl Session {
    /// Log in using the account's public REST endpoint
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        Self::connect_to(&config.base_url(), config).await
    }

    /// Log in against an explicit base URL (tests point this at a fixture)
    pub async fn connect_to(base_url: &str, config: &WarehouseConfig) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::connection(format!("invalid warehouse URL: {e}")))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{CLIENT_APP_ID}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::connection(format!("failed to build HTTP client: {e}")))?;

        let mut url = join(&base_url, "/session/v1/login-request")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("warehouse", &config.warehouse);
            query.append_pair("databaseName", &config.database);
            query.append_pair("schemaName", &config.schema);
            if let Some(role) = &config.role {
                query.append_pair("roleName", role);
            }
            query.append_pair("requestId", &Uuid::new_v4().to_string());
        }

        let body = json!({
            "data": {
                "LOGIN_NAME": config.user,
                "PASSWORD": config.password,
                "ACCOUNT_NAME": config.account,
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
            }
        });

        let response = http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::connection(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::connection(format!(
                "login rejected with HTTP {status}"
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| Error::connection(format!("malformed login response: {e}")))?;
        if !auth.success {
            return Err(Error::connection(
                auth.message.unwrap_or_else(|| "login refused".to_string()),
            ));
        }
        let token = auth
            .data
            .ok_or_else(|| Error::connection("login response carried no session data"))?
            .token;

        Ok(Self {
            http,
            base_url,
            token,
            sequence: AtomicU64::new(0),
        })
    }

    /// Execute one SQL statement
    pub async fn execute(&self, sql: &str) -> Result<QueryData> {
        let mut url = join(&self.base_url, "/queries/v1/query-request")?;
        url.query_pairs_mut()
            .append_pair("requestId", &Uuid::new_v4().to_string());

        let sequence_id = self.sequence.fetch_add(1, Ordering::Relaxed);
        debug!("Executing statement {}: {}", sequence_id, first_line(sql));

        let body = json!({
            "sqlText": sql,
            "sequenceId": sequence_id,
            "describeOnly": false,
        });

        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::query(format!("query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::query(format!(
                "query rejected with HTTP {status}"
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::query(format!("malformed query response: {e}")))?;
        if !parsed.success {
            return Err(Error::query(
                parsed
                    .message
                    .unwrap_or_else(|| "statement failed".to_string()),
            ));
        }
        Ok(parsed.data.unwrap_or_default())
    }

    /// Release the session
    ///
    /// Callers invoke this on every exit path; a failed logout is logged
    /// by the caller and never masks the primary error.
    pub async fn close(&self) -> Result<()> {
        let url = join(&self.base_url, "/session/logout-request")?;
        self.http
            .post(url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| Error::connection(format!("logout failed: {e}")))?;
        Ok(())
    }

    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::connection(format!("invalid warehouse URL path: {e}")))
}

fn first_line(sql: &str) -> &str {
    sql.lines().find(|l| !l.trim().is_empty()).unwrap_or(sql)
}
