// file: src/api.rs
// description: REST client for the checker backend (check runs, status, history, config)

use crate::{
    error::ApiError,
    types::{
        CheckStatus, DashboardConfig, HistoryEntry, HistoryPage, HistoryQuery, RunChecksRequest,
        RunChecksResponse,
    },
};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const RUN_PATH: &str = "/api/checks/run";
const STATUS_PATH: &str = "/api/checks/status";
const HISTORY_PATH: &str = "/api/history";
const CONFIG_PATH: &str = "/api/config";

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: Url,
}

impl ApiClient {
    pub fn new(origin: &Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("edgecheck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            origin: origin.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.origin.join(path)?)
    }

    /// Submits a check run. The backend answers immediately; progress arrives
    /// over the push channel.
    #[instrument(skip(self))]
    pub async fn run_checks(&self, request: &RunChecksRequest) -> Result<RunChecksResponse, ApiError> {
        let response = self.http.post(self.url(RUN_PATH)?).json(request).send().await?;
        decode(response, "check run request failed").await
    }

    pub async fn check_status(&self) -> Result<CheckStatus, ApiError> {
        let response = self.http.get(self.url(STATUS_PATH)?).send().await?;
        decode(response, "check status lookup failed").await
    }

    #[instrument(skip(self))]
    pub async fn history(&self, query: &HistoryQuery) -> Result<HistoryPage, ApiError> {
        let response = self
            .http
            .get(self.url(HISTORY_PATH)?)
            .query(query)
            .send()
            .await?;
        decode(response, "history lookup failed").await
    }

    pub async fn history_detail(&self, id: i64) -> Result<HistoryEntry, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("{}/{}", HISTORY_PATH, id))?)
            .send()
            .await?;
        decode(response, "history entry lookup failed").await
    }

    pub async fn config(&self) -> Result<DashboardConfig, ApiError> {
        let response = self.http.get(self.url(CONFIG_PATH)?).send().await?;
        decode(response, "config lookup failed").await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, ApiError> {
    let status = response.status();
    debug!(status = %status, url = %response.url(), "API response");

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        detail: error_detail(&body).unwrap_or_else(|| fallback.to_string()),
    })
}

/// Pulls the `detail` message out of an error body. Validation failures carry
/// a list of `{msg}` objects instead of a string.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
