//! Upstream record sources.
//!
//! Both the REST gateway and the CSV-backed route speak HTTP+JSON; they
//! differ only in endpoint path and row shape. `LicenseSource` is the seam
//! the coordinator fetches through, so tests can substitute fakes.
//!
//! Modules:
//! - client: reqwest client for both upstreams

pub mod client;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LicenseError;
use crate::types::{CostCenter, LicenseRecord};

pub use client::GatewayClient;

/// The two suspension points of the core: cost centers and record batches.
#[async_trait]
pub trait LicenseSource: Send + Sync {
    async fn fetch_cost_centers(&self) -> Result<Vec<CostCenter>, LicenseError>;

    async fn fetch_records(&self, cost_center: &str) -> Result<Vec<LicenseRecord>, LicenseError>;
}

/// Trim, drop blanks, dedupe (case-sensitive) and sort.
pub fn tidy_cost_centers<I, S>(names: I) -> Vec<CostCenter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// Retry
// ============================================================================

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, first one included.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// 408, 429 and 5xx are worth another try; everything else is final.
fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Seconds-form `Retry-After`, capped. HTTP-date values are ignored.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Wait before try `attempt + 1`: linear in the attempt number.
fn backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    policy.backoff.saturating_mul(attempt.max(1))
}

/// Send `request`, repeating it while the failure is transient and tries remain.
///
/// The last response is returned whatever its status; callers map statuses.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, LicenseError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let last = attempt >= attempts;
        let sent = match request.try_clone() {
            Some(req) if !last => req.send().await,
            _ => return request.send().await.map_err(transport_error),
        };

        let wait = match &sent {
            Ok(resp) if is_transient(resp.status()) => {
                let wait = retry_after(resp.headers()).unwrap_or_else(|| backoff(attempt, policy));
                log::warn!(
                    "Gateway: status {} on try {}/{}, again in {:?}",
                    resp.status(),
                    attempt,
                    attempts,
                    wait
                );
                Some(wait)
            }
            Err(err) if err.is_timeout() || err.is_connect() => {
                let wait = backoff(attempt, policy);
                log::warn!(
                    "Gateway: {} on try {}/{}, again in {:?}",
                    err,
                    attempt,
                    attempts,
                    wait
                );
                Some(wait)
            }
            _ => None,
        };
        let Some(wait) = wait else {
            return sent.map_err(transport_error);
        };

        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

fn transport_error(err: reqwest::Error) -> LicenseError {
    LicenseError::SourceUnavailable(format!("Failed to reach license API: {}", err))
}
