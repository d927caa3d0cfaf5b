//! Error types for record and cost-center fetches
//!
//! Errors are classified by recoverability:
//! - Retryable: transport failures, timeouts, 408/429/5xx
//! - NonRetryable: missing configuration, bad payloads, 4xx
//!
//! Stale responses are not errors. The coordinator drops them silently.

use thiserror::Error;

/// Longest body excerpt kept on a pass-through failure.
const MAX_BODY_EXCERPT: usize = 500;

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    BadResponseShape(String),

    #[error("Missing required query param: cost_center_name")]
    MissingCostCenter,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LicenseError {
    /// Non-JSON body surfaced as-is (trimmed to a readable excerpt).
    pub fn pass_through(body: &str) -> Self {
        let trimmed = body.trim();
        let excerpt: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
        if excerpt.is_empty() {
            LicenseError::BadResponseShape("empty non-JSON body".to_string())
        } else {
            LicenseError::BadResponseShape(excerpt)
        }
    }

    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LicenseError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if a fresh attempt has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            LicenseError::SourceUnavailable(_) => true,
            LicenseError::Api { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LicenseError::SourceUnavailable(_) => {
                "Check the API base URL and your network connection, then retry."
            }
            LicenseError::Api { status, .. } if *status == 401 || *status == 403 => {
                "Your session may have expired. Sign in again and retry."
            }
            LicenseError::Api { .. } => "The license service returned an error. Try again later.",
            LicenseError::BadResponseShape(_) => {
                "The license service returned an unexpected payload. Contact the data owner."
            }
            LicenseError::MissingCostCenter => "Select a cost center to load data.",
            LicenseError::Config(_) => "Check ~/.license-reduction/config.json",
        }
    }
}

impl From<serde_json::Error> for LicenseError {
    fn from(err: serde_json::Error) -> Self {
        LicenseError::BadResponseShape(err.to_string())
    }
}

/// Serializable error indicator shown next to the table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

impl From<&LicenseError> for FetchFailure {
    fn from(err: &LicenseError) -> Self {
        FetchFailure {
            message: err.to_string(),
            status: err.status(),
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let api = |status| LicenseError::Api {
            status,
            message: String::new(),
        };
        assert!(api(503).is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(408).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(LicenseError::SourceUnavailable("down".into()).is_retryable());
        assert!(!LicenseError::BadResponseShape("<html>".into()).is_retryable());
    }

    #[test]
    fn test_pass_through_truncates() {
        let body = "x".repeat(2_000);
        match LicenseError::pass_through(&body) {
            LicenseError::BadResponseShape(text) => assert_eq!(text.len(), MAX_BODY_EXCERPT),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            LicenseError::pass_through("   "),
            LicenseError::BadResponseShape(ref t) if t == "empty non-JSON body"
        ));
    }

    #[test]
    fn test_fetch_failure_carries_status() {
        let err = LicenseError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        let failure = FetchFailure::from(&err);
        assert_eq!(failure.status, Some(502));
        assert!(failure.can_retry);
        assert_eq!(failure.message, "API error 502: bad gateway");

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["canRetry"], true);
        assert!(json.get("recoverySuggestion").is_some());
    }
}
