//! Field normalizer: raw upstream rows → canonical `LicenseRecord`s.
//!
//! A response is homogeneous, so the caller tags the whole batch with its
//! shape and every row is read through that shape's key table. Rows never
//! fail: anything missing or malformed falls back to empty strings and zero,
//! and the row is still emitted.

use serde_json::{Map, Value};

use crate::types::{LicenseRecord, LicenseTier, RecommendedAction, ANALYST, CONSUMER};

/// A raw response body tagged with the upstream shape that produced it.
#[derive(Debug, Clone)]
pub enum RawBatch {
    /// snake_case rows from the CSV export.
    Csv(Vec<Value>),
    /// camelCase rows from the REST gateway.
    Gateway(Vec<Value>),
}

/// Normalized batch plus how many rows needed at least one default.
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub records: Vec<LicenseRecord>,
    pub defaulted_rows: usize,
}

/// Key aliases per canonical field, in lookup priority order.
struct KeyTable {
    user: &'static [&'static str],
    name: &'static [&'static str],
    email: &'static [&'static str],
    cost_center_name: &'static [&'static str],
    department_name: &'static [&'static str],
    title: &'static [&'static str],
    status_name: &'static [&'static str],
    current_license: &'static [&'static str],
    recommended_action: &'static [&'static str],
    last_active: &'static [&'static str],
    est_savings_usd: &'static [&'static str],
    analyst_actions_per_day: &'static [&'static str],
    active_days: &'static [&'static str],
}

const CSV_KEYS: KeyTable = KeyTable {
    user: &["user"],
    name: &["name"],
    email: &["email"],
    cost_center_name: &["cost_center_name"],
    department_name: &["department_name"],
    title: &["title"],
    status_name: &["status_name"],
    current_license: &["current_license"],
    recommended_action: &["recommended_action"],
    last_active: &["last_active"],
    est_savings_usd: &["est_savings_usd"],
    analyst_actions_per_day: &[],
    active_days: &[],
};

const GATEWAY_KEYS: KeyTable = KeyTable {
    user: &["user"],
    name: &["name"],
    email: &["email"],
    cost_center_name: &["costCenterName"],
    department_name: &["departmentName"],
    title: &["title"],
    status_name: &["statusName"],
    current_license: &["currentLicense"],
    recommended_action: &["recommendedAction"],
    // The Python gateway spells it `lastActivity`.
    last_active: &["lastActive", "lastActivity"],
    est_savings_usd: &["estSavingsUsd"],
    analyst_actions_per_day: &["analystActionsPerDay"],
    active_days: &["activeDays"],
};

/// Tracks whether any field of the current row fell back to a default.
struct RowReader<'a> {
    row: Option<&'a Map<String, Value>>,
    defaulted: bool,
}

impl<'a> RowReader<'a> {
    fn new(value: &'a Value) -> Self {
        let row = value.as_object();
        Self {
            row,
            defaulted: row.is_none(),
        }
    }

    fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        let row = self.row?;
        keys.iter()
            .filter_map(|k| row.get(*k))
            .find(|v| !v.is_null())
    }

    fn text(&mut self, keys: &[&str]) -> String {
        match self.lookup(keys) {
            None => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(_) => {
                self.defaulted = true;
                String::new()
            }
        }
    }

    /// Safe numeric parse: absent or unparsable becomes 0, never an error.
    fn number(&mut self, keys: &[&str]) -> f64 {
        let Some(value) = self.lookup(keys) else {
            return 0.0;
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => return 0.0,
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() && n >= 0.0 => n,
            _ => {
                self.defaulted = true;
                0.0
            }
        }
    }
}

/// Normalize a whole batch. Output length always equals input length.
pub fn normalize_batch(batch: &RawBatch) -> NormalizeReport {
    let (rows, keys) = match batch {
        RawBatch::Csv(rows) => (rows, &CSV_KEYS),
        RawBatch::Gateway(rows) => (rows, &GATEWAY_KEYS),
    };

    let mut report = NormalizeReport {
        records: Vec::with_capacity(rows.len()),
        defaulted_rows: 0,
    };
    for row in rows {
        let (record, defaulted) = normalize_row(row, keys);
        if defaulted {
            report.defaulted_rows += 1;
        }
        report.records.push(record);
    }

    if report.defaulted_rows > 0 {
        log::debug!(
            "Normalizer: {} of {} rows filled with defaults",
            report.defaulted_rows,
            rows.len()
        );
    }
    report
}

/// Normalize one snake_case CSV-export row.
pub fn normalize_csv_row(row: &Value) -> LicenseRecord {
    normalize_row(row, &CSV_KEYS).0
}

/// Normalize one camelCase gateway row.
pub fn normalize_gateway_row(row: &Value) -> LicenseRecord {
    normalize_row(row, &GATEWAY_KEYS).0
}

fn normalize_row(row: &Value, keys: &KeyTable) -> (LicenseRecord, bool) {
    let mut reader = RowReader::new(row);

    let user = reader.text(keys.user);
    if user.is_empty() {
        reader.defaulted = true;
    }

    let current_license_raw = reader.text(keys.current_license);
    let analyst_actions_per_day = reader.number(keys.analyst_actions_per_day);
    let recommended_raw = reader.text(keys.recommended_action);
    let has_activity_metric = reader.lookup(keys.analyst_actions_per_day).is_some();

    let recommended_action = if recommended_raw.is_empty() && has_activity_metric {
        derive_recommendation(analyst_actions_per_day)
    } else {
        RecommendedAction::from_raw(&recommended_raw)
    };

    let record = LicenseRecord {
        user,
        name: reader.text(keys.name),
        email: reader.text(keys.email),
        cost_center_name: reader.text(keys.cost_center_name),
        department_name: reader.text(keys.department_name),
        title: reader.text(keys.title),
        status_name: reader.text(keys.status_name),
        current_license: LicenseTier::parse(&current_license_raw),
        recommended_action,
        last_active: reader.text(keys.last_active),
        est_savings_usd: reader.number(keys.est_savings_usd),
        analyst_actions_per_day,
        active_days: reader.number(keys.active_days).floor() as u64,
    };
    (record, reader.defaulted)
}

/// One or more analyst actions per day keeps the Analyst tier.
fn derive_recommendation(analyst_actions_per_day: f64) -> RecommendedAction {
    if analyst_actions_per_day >= 1.0 {
        RecommendedAction::from_raw(ANALYST)
    } else {
        RecommendedAction::from_raw(CONSUMER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_row_maps_snake_case() {
        let record = normalize_csv_row(&json!({
            "user": "kkashmiry0641",
            "current_license": "Analyst",
            "last_active": "2026-02-01",
            "recommended_action": "Downgrade to Business Author",
            "est_savings_usd": "1200",
            "cost_center_name": "ETCH"
        }));
        assert_eq!(record.user, "kkashmiry0641");
        assert_eq!(record.current_license, Some(LicenseTier::Analyst));
        assert_eq!(record.last_active, "2026-02-01");
        assert_eq!(
            record.recommended_action.as_str(),
            "Downgrade to Business Author"
        );
        assert_eq!(record.est_savings_usd, 1200.0);
        assert_eq!(record.cost_center_name, "ETCH");
        assert_eq!(record.name, "");
        assert_eq!(record.email, "");
    }

    #[test]
    fn test_gateway_row_maps_camel_case() {
        let record = normalize_gateway_row(&json!({
            "user": "vdasika4950",
            "name": "V Dasika",
            "email": "v.dasika@example.com",
            "costCenterName": "T1 MIE",
            "departmentName": "MIE RMG/MOL",
            "title": "Senior Engineer",
            "statusName": "Active",
            "recommendedAction": "Analyst",
            "lastActivity": "2025-12-16 17:25:05",
            "analystActionsPerDay": 0.3222,
            "activeDays": 1
        }));
        assert_eq!(record.user, "vdasika4950");
        assert_eq!(record.cost_center_name, "T1 MIE");
        assert_eq!(record.department_name, "MIE RMG/MOL");
        assert_eq!(record.status_name, "Active");
        assert!(record.is_analyst());
        assert_eq!(record.last_active, "2025-12-16 17:25:05");
        assert_eq!(record.current_license, None);
        assert_eq!(record.est_savings_usd, 0.0);
        assert_eq!(record.active_days, 1);
    }

    #[test]
    fn test_gateway_prefers_last_active_over_alias() {
        let record = normalize_gateway_row(&json!({
            "user": "a",
            "lastActive": "2026-01-01",
            "lastActivity": "2025-01-01"
        }));
        assert_eq!(record.last_active, "2026-01-01");
    }

    #[test]
    fn test_shapes_do_not_cross_read() {
        // camelCase keys are invisible to the CSV table and vice versa.
        let csv = normalize_csv_row(&json!({"user": "a", "recommendedAction": "Analyst"}));
        assert!(!csv.is_analyst());
        let gw = normalize_gateway_row(&json!({"user": "a", "est_savings_usd": 50}));
        assert_eq!(gw.est_savings_usd, 0.0);
    }

    #[test]
    fn test_recommendation_derived_from_activity() {
        let heavy = normalize_gateway_row(&json!({"user": "a", "analystActionsPerDay": 1}));
        assert!(heavy.is_analyst());
        let light = normalize_gateway_row(&json!({"user": "b", "analystActionsPerDay": "0.5"}));
        assert!(light.recommended_action.is_consumer());
        let explicit = normalize_gateway_row(&json!({
            "user": "c",
            "recommendedAction": "Keep",
            "analystActionsPerDay": 5
        }));
        assert_eq!(explicit.recommended_action.as_str(), "Keep");
    }

    #[test]
    fn test_numeric_coercion_defaults_to_zero() {
        for raw in [json!("abc"), json!(null), json!(-5), json!([1]), json!("")] {
            let record = normalize_csv_row(&json!({"user": "a", "est_savings_usd": raw}));
            assert_eq!(record.est_savings_usd, 0.0);
        }
        let with_commas = normalize_csv_row(&json!({"user": "a", "est_savings_usd": "1,800"}));
        assert_eq!(with_commas.est_savings_usd, 1800.0);
    }

    #[test]
    fn test_malformed_rows_are_kept() {
        let batch = RawBatch::Gateway(vec![
            json!({"user": "ok", "recommendedAction": "Consumer"}),
            json!("not an object"),
            json!(null),
            json!({"name": "No Login"}),
            json!({"user": "bad-savings", "estSavingsUsd": "n/a"}),
        ]);
        let report = normalize_batch(&batch);
        assert_eq!(report.records.len(), 5);
        assert_eq!(report.defaulted_rows, 4);
        assert_eq!(report.records[1], LicenseRecord::default());
        assert_eq!(report.records[3].name, "No Login");
        assert_eq!(report.records[3].user, "");
    }

    #[test]
    fn test_empty_batch() {
        let report = normalize_batch(&RawBatch::Csv(Vec::new()));
        assert!(report.records.is_empty());
        assert_eq!(report.defaulted_rows, 0);
    }
}
