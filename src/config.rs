//! Config loading and base-address resolution.
//!
//! Resolution is a pure function of its inputs and is evaluated on every
//! request, so a harness can swap the override between scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LicenseError;
use crate::types::Config;

/// Gateway path used when no override is configured.
pub const DEFAULT_API_BASE: &str = "/cloudappbackend/atlassian-api";

/// Environment override for the base address; beats the config file.
pub const API_BASE_ENV: &str = "LICENSE_API_BASE_URL";

/// Origin that relative bases (the default gateway path) are joined onto.
pub const API_ORIGIN_ENV: &str = "LICENSE_API_ORIGIN";

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Resolve the base address from an explicit override.
///
/// A blank override counts as absent. Trailing slashes are stripped.
pub fn resolve_api_base(override_base: Option<&str>) -> String {
    match override_base.map(str::trim).filter(|s| !s.is_empty()) {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => DEFAULT_API_BASE.to_string(),
    }
}

/// The override value in effect right now: env var first, then config file.
pub fn api_base_override(config: &Config) -> Option<String> {
    std::env::var(API_BASE_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| config.api_base_url.clone())
}

/// Build an absolute endpoint URL under the resolved base.
///
/// `origin` is only consulted when the base is a bare path.
pub fn endpoint_url(
    base: &str,
    origin: Option<&str>,
    path: &str,
    query: &[(&str, &str)],
) -> Result<url::Url, LicenseError> {
    let joined = format!("{}/{}", base, path.trim_start_matches('/'));
    let mut url = if joined.starts_with('/') {
        let origin = origin
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(DEFAULT_ORIGIN);
        url::Url::parse(origin)
            .and_then(|o| o.join(&joined))
            .map_err(|e| LicenseError::SourceUnavailable(format!("invalid origin {origin}: {e}")))?
    } else {
        url::Url::parse(&joined)
            .map_err(|e| LicenseError::SourceUnavailable(format!("invalid base {base}: {e}")))?
    };

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().copied());
    }
    Ok(url)
}

pub fn config_path() -> Result<PathBuf, LicenseError> {
    let home = dirs::home_dir()
        .ok_or_else(|| LicenseError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".license-reduction").join("config.json"))
}

/// Load config from ~/.license-reduction/config.json (defaults when absent).
pub fn load_config() -> Result<Config, LicenseError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, LicenseError> {
    if !path.exists() {
        log::debug!("Config: {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| LicenseError::Config(format!("Failed to read config: {}", e)))?;

    serde_json::from_str(&content)
        .map_err(|e| LicenseError::Config(format!("Failed to parse config: {}", e)))
}
