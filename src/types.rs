use serde::{Deserialize, Serialize};

/// Display name the upstream emits when HR no longer resolves the login.
pub const POSSIBLY_TERMINATED: &str = "Possibly Terminated";

/// Employment statuses that get a warning badge in the table.
pub const FLAGGED_STATUSES: &[&str] = &["Unknown", "Terminated"];

/// The recommendation value that forms the distinguished first group.
pub const ANALYST: &str = "Analyst";

/// Recommendation value counted by the summary's consumer bucket.
pub const CONSUMER: &str = "Consumer";

/// A cost center name as returned by the cost-center source.
pub type CostCenter = String;

/// Closed set of license tiers a user can currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseTier {
    Analyst,
    #[serde(rename = "Business Author")]
    BusinessAuthor,
    Consumer,
}

impl LicenseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseTier::Analyst => "Analyst",
            LicenseTier::BusinessAuthor => "Business Author",
            LicenseTier::Consumer => "Consumer",
        }
    }

    /// Exact, trimmed match against the upstream spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Analyst" => Some(LicenseTier::Analyst),
            "Business Author" => Some(LicenseTier::BusinessAuthor),
            "Consumer" => Some(LicenseTier::Consumer),
            _ => None,
        }
    }
}

impl std::fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recommendation is either a raw tier or a human-readable action.
///
/// Serializes as the plain upstream string either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecommendedAction {
    Tier(LicenseTier),
    Action(String),
}

impl RecommendedAction {
    pub fn from_raw(value: &str) -> Self {
        match LicenseTier::parse(value) {
            Some(tier) => RecommendedAction::Tier(tier),
            None => RecommendedAction::Action(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecommendedAction::Tier(tier) => tier.as_str(),
            RecommendedAction::Action(text) => text,
        }
    }

    /// Only the literal `"Analyst"` forms the distinguished category.
    pub fn is_analyst(&self) -> bool {
        self.as_str() == ANALYST
    }

    pub fn is_consumer(&self) -> bool {
        self.as_str() == CONSUMER
    }
}

impl Default for RecommendedAction {
    fn default() -> Self {
        RecommendedAction::Action(String::new())
    }
}

/// Canonical per-user record, independent of which upstream produced it.
///
/// Optional string fields are empty rather than absent so comparisons never
/// need to special-case missing values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    pub user: String,
    pub name: String,
    pub email: String,
    pub cost_center_name: String,
    pub department_name: String,
    pub title: String,
    pub status_name: String,
    pub current_license: Option<LicenseTier>,
    pub recommended_action: RecommendedAction,
    pub last_active: String,
    pub est_savings_usd: f64,
    /// Gateway extra; zero for CSV rows.
    pub analyst_actions_per_day: f64,
    /// Gateway extra; zero for CSV rows.
    pub active_days: u64,
}

impl LicenseRecord {
    pub fn is_possibly_terminated(&self) -> bool {
        self.name == POSSIBLY_TERMINATED
    }

    pub fn has_flagged_status(&self) -> bool {
        FLAGGED_STATUSES.contains(&self.status_name.as_str())
    }

    pub fn is_analyst(&self) -> bool {
        self.recommended_action.is_analyst()
    }
}

/// Which upstream serves record batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// camelCase rows from the REST gateway.
    #[default]
    Gateway,
    /// snake_case rows derived from the static CSV export.
    Csv,
}

/// User configuration stored in ~/.license-reduction/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit base address; falls back to the gateway path when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub source: SourceKind,
    /// Forwarded as the `Cookie` header so requests carry the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    #[serde(default = "default_cost_center_ttl_minutes")]
    pub cost_center_ttl_minutes: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per request, so the default of 2 allows a single retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_cost_center_ttl_minutes() -> u32 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            source: SourceKind::default(),
            session_cookie: None,
            cost_center_ttl_minutes: default_cost_center_ttl_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommended_action_from_raw() {
        assert_eq!(
            RecommendedAction::from_raw("Analyst"),
            RecommendedAction::Tier(LicenseTier::Analyst)
        );
        assert_eq!(
            RecommendedAction::from_raw("Downgrade to Consumer"),
            RecommendedAction::Action("Downgrade to Consumer".to_string())
        );
        assert!(RecommendedAction::from_raw(" Analyst ").is_analyst());
        assert!(!RecommendedAction::from_raw("analyst").is_analyst());
    }

    #[test]
    fn test_recommended_action_serializes_as_plain_string() {
        let tier = serde_json::to_string(&RecommendedAction::Tier(LicenseTier::BusinessAuthor)).unwrap();
        assert_eq!(tier, "\"Business Author\"");
        let action = serde_json::to_string(&RecommendedAction::from_raw("Keep")).unwrap();
        assert_eq!(action, "\"Keep\"");
    }

    #[test]
    fn test_record_flags() {
        let record = LicenseRecord {
            user: "jdoe".into(),
            name: POSSIBLY_TERMINATED.into(),
            status_name: "Terminated".into(),
            recommended_action: RecommendedAction::from_raw("Analyst"),
            ..Default::default()
        };
        assert!(record.is_possibly_terminated());
        assert!(record.has_flagged_status());
        assert!(record.is_analyst());

        let plain = LicenseRecord {
            status_name: "Active".into(),
            ..Default::default()
        };
        assert!(!plain.is_possibly_terminated());
        assert!(!plain.has_flagged_status());
        assert!(!plain.is_analyst());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.api_base_url.is_none());
        assert_eq!(config.source, SourceKind::Gateway);
        assert_eq!(config.cost_center_ttl_minutes, 60);
        assert_eq!(config.max_attempts, 2);
    }

    #[test]
    fn test_config_parses_csv_source() {
        let config: Config =
            serde_json::from_str(r#"{"apiBaseUrl":"http://x","source":"csv"}"#).unwrap();
        assert_eq!(config.source, SourceKind::Csv);
        assert_eq!(config.api_base_url.as_deref(), Some("http://x"));
    }
}
