//! HTTP client for the license-reduction API.
//!
//! Every request goes out with `Accept: application/json` and caching
//! disabled, and forwards the configured session cookie. The base address is
//! resolved from config on each call rather than captured at construction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde_json::Value;

use super::{send_with_retry, tidy_cost_centers, LicenseSource, RetryPolicy};
use crate::config::{api_base_override, endpoint_url, resolve_api_base, API_ORIGIN_ENV};
use crate::error::LicenseError;
use crate::normalize::{normalize_batch, RawBatch};
use crate::types::{Config, CostCenter, LicenseRecord, SourceKind};

const COST_CENTERS_PATH: &str = "cost-centers";
const GATEWAY_RECORDS_PATH: &str = "license-reduction";
const CSV_RECORDS_PATH: &str = "license-reduction-csv";
const COST_CENTER_PARAM: &str = "cost_center_name";

pub struct GatewayClient {
    client: reqwest::Client,
    config: Config,
    retry: RetryPolicy,
    pinned_base: Option<String>,
}

impl GatewayClient {
    pub fn new(config: Config) -> Result<Self, LicenseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| LicenseError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let retry = RetryPolicy::with_max_attempts(config.max_attempts);
        Ok(Self {
            client,
            config,
            retry,
            pinned_base: None,
        })
    }

    /// Client bound to a fixed base address. Neither the environment nor
    /// `config.api_base_url` is consulted afterwards.
    pub fn with_api_base(config: Config, api_base: &str) -> Result<Self, LicenseError> {
        let mut client = Self::new(config)?;
        client.pinned_base = Some(resolve_api_base(Some(api_base)));
        Ok(client)
    }

    pub fn source_kind(&self) -> SourceKind {
        self.config.source
    }

    /// Base address as of right now.
    pub fn api_base(&self) -> String {
        match &self.pinned_base {
            Some(base) => base.clone(),
            None => resolve_api_base(api_base_override(&self.config).as_deref()),
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<url::Url, LicenseError> {
        let origin = std::env::var(API_ORIGIN_ENV).ok();
        endpoint_url(&self.api_base(), origin.as_deref(), path, query)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, LicenseError> {
        let url = self.url(path, query)?;
        log::debug!("Gateway: GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .header(header::CACHE_CONTROL, "no-store")
            .header(header::PRAGMA, "no-cache");
        if let Some(cookie) = self.config.session_cookie.as_deref() {
            request = request.header(header::COOKIE, cookie);
        }

        let resp = send_with_retry(request, &self.retry).await?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = resp.text().await.map_err(|e| {
            LicenseError::SourceUnavailable(format!("Failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            return Err(LicenseError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if !content_type.contains("application/json") {
            return Err(LicenseError::pass_through(&body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Prefer the `error`/`detail` field of a JSON error body.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(text) = json.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

fn expect_array(value: Value, what: &str) -> Result<Vec<Value>, LicenseError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(LicenseError::BadResponseShape(format!(
            "expected a JSON array of {}, got {}",
            what,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl LicenseSource for GatewayClient {
    async fn fetch_cost_centers(&self) -> Result<Vec<CostCenter>, LicenseError> {
        let items = expect_array(self.get_json(COST_CENTERS_PATH, &[]).await?, "cost centers")?;
        let names = items.iter().filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let centers = tidy_cost_centers(names);
        log::info!("Gateway: fetched {} cost centers", centers.len());
        Ok(centers)
    }

    async fn fetch_records(&self, cost_center: &str) -> Result<Vec<LicenseRecord>, LicenseError> {
        let cost_center = cost_center.trim();
        if cost_center.is_empty() {
            return Err(LicenseError::MissingCostCenter);
        }

        let path = match self.config.source {
            SourceKind::Gateway => GATEWAY_RECORDS_PATH,
            SourceKind::Csv => CSV_RECORDS_PATH,
        };
        let rows = expect_array(
            self.get_json(path, &[(COST_CENTER_PARAM, cost_center)]).await?,
            "records",
        )?;
        let batch = match self.config.source {
            SourceKind::Gateway => RawBatch::Gateway(rows),
            SourceKind::Csv => RawBatch::Csv(rows),
        };
        Ok(normalize_batch(&batch).records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_fields() {
        assert_eq!(
            error_message(r#"{"error":"FASTAPI_BASE_URL is not configured"}"#),
            "FASTAPI_BASE_URL is not configured"
        );
        assert_eq!(
            error_message(r#"{"detail":"CSV missing 'cost_center_name' column"}"#),
            "CSV missing 'cost_center_name' column"
        );
        assert_eq!(error_message("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn test_expect_array_rejects_objects() {
        let err = expect_array(serde_json::json!({"error": "x"}), "records").unwrap_err();
        match err {
            LicenseError::BadResponseShape(msg) => assert!(msg.contains("an object")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pinned_api_base_beats_config() {
        let mut config = Config::default();
        config.api_base_url = Some("http://config.invalid".to_string());
        let client = GatewayClient::with_api_base(config, "http://localhost:8000/").unwrap();
        assert_eq!(client.api_base(), "http://localhost:8000");

        let url = client.url(COST_CENTERS_PATH, &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/cost-centers");
    }

    #[tokio::test]
    async fn test_fetch_records_requires_cost_center() {
        let client = GatewayClient::new(Config::default()).unwrap();
        let err = client.fetch_records("   ").await.unwrap_err();
        assert!(matches!(err, LicenseError::MissingCostCenter));
    }
}
