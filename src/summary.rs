//! Scope statistics for the active cost center.
//!
//! Always computed over the full canonical list, never the searched view.

use serde::Serialize;

use crate::types::LicenseRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub analyst_count: usize,
    pub consumer_count: usize,
    /// Everything that is neither exactly "Analyst" nor exactly "Consumer".
    pub other_count: usize,
    pub total_count: usize,
    pub analyst_pct: u32,
    pub consumer_pct: u32,
    pub total_savings_usd: f64,
}

/// `round(count / total * 100)`, or 0 for an empty scope.
fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

pub fn summarize(records: &[LicenseRecord]) -> Summary {
    let total_count = records.len();
    let analyst_count = records.iter().filter(|r| r.is_analyst()).count();
    let consumer_count = records
        .iter()
        .filter(|r| r.recommended_action.is_consumer())
        .count();
    let total_savings_usd = records.iter().map(|r| r.est_savings_usd).sum();

    Summary {
        analyst_count,
        consumer_count,
        other_count: total_count - analyst_count - consumer_count,
        total_count,
        analyst_pct: percent(analyst_count, total_count),
        consumer_pct: percent(consumer_count, total_count),
        total_savings_usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::rank;
    use crate::types::RecommendedAction;

    fn rec(user: &str, action: &str, savings: f64) -> LicenseRecord {
        LicenseRecord {
            user: user.to_string(),
            recommended_action: RecommendedAction::from_raw(action),
            est_savings_usd: savings,
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.analyst_pct, 0);
        assert_eq!(summary.consumer_pct, 0);
    }

    #[test]
    fn test_summarize_counts_and_rounding() {
        let records = vec![
            rec("a", "Analyst", 0.0),
            rec("b", "Consumer", 1200.0),
            rec("c", "Consumer", 600.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.analyst_count, 1);
        assert_eq!(summary.consumer_count, 2);
        assert_eq!(summary.other_count, 0);
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.analyst_pct, 33);
        assert_eq!(summary.consumer_pct, 67);
        assert_eq!(summary.total_savings_usd, 1800.0);
    }

    #[test]
    fn test_consumer_count_is_exact_match() {
        let records = vec![
            rec("a", "Downgrade to Consumer", 0.0),
            rec("b", "Keep", 0.0),
            rec("c", "Consumer", 0.0),
            rec("d", "Analyst", 0.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.consumer_count, 1);
        assert_eq!(summary.analyst_count, 1);
        assert_eq!(summary.other_count, 2);
        assert_eq!(summary.consumer_pct, 25);
    }

    #[test]
    fn test_summary_ignores_search() {
        let records = vec![
            rec("amy", "Consumer", 10.0),
            rec("bob", "Analyst", 0.0),
            rec("zed", "Analyst", 0.0),
        ];
        let before = summarize(&records);
        for query in ["", "am", "nobody", "z"] {
            let _view = rank(&records, query, None);
            assert_eq!(summarize(&records), before);
        }
    }
}
