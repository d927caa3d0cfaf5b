//! Ranking engine: search filter, default Analyst-first ordering, and
//! explicit column sort override.
//!
//! Filtering runs first; ordering (default or explicit) is computed over the
//! surviving rows. Both orderings are stable, so ties keep input order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::LicenseRecord;

/// Every column the table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    User,
    Name,
    Email,
    #[serde(rename = "costCenterName")]
    CostCenter,
    #[serde(rename = "departmentName")]
    Department,
    Title,
    #[serde(rename = "statusName")]
    Status,
    CurrentLicense,
    RecommendedAction,
    LastActive,
    #[serde(rename = "estSavingsUsd")]
    EstSavings,
}

impl SortField {
    pub const ALL: [SortField; 11] = [
        SortField::User,
        SortField::Name,
        SortField::Email,
        SortField::CostCenter,
        SortField::Department,
        SortField::Title,
        SortField::Status,
        SortField::CurrentLicense,
        SortField::RecommendedAction,
        SortField::LastActive,
        SortField::EstSavings,
    ];

    /// Column key, matching the canonical record's field name.
    pub fn key(&self) -> &'static str {
        match self {
            SortField::User => "user",
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::CostCenter => "costCenterName",
            SortField::Department => "departmentName",
            SortField::Title => "title",
            SortField::Status => "statusName",
            SortField::CurrentLicense => "currentLicense",
            SortField::RecommendedAction => "recommendedAction",
            SortField::LastActive => "lastActive",
            SortField::EstSavings => "estSavingsUsd",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.key().eq_ignore_ascii_case(key))
    }

    /// The field value as the lowercase string explicit sorting compares on.
    fn sort_key(&self, record: &LicenseRecord) -> String {
        let raw = match self {
            SortField::User => record.user.clone(),
            SortField::Name => record.name.clone(),
            SortField::Email => record.email.clone(),
            SortField::CostCenter => record.cost_center_name.clone(),
            SortField::Department => record.department_name.clone(),
            SortField::Title => record.title.clone(),
            SortField::Status => record.status_name.clone(),
            SortField::CurrentLicense => record
                .current_license
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            SortField::RecommendedAction => record.recommended_action.as_str().to_string(),
            SortField::LastActive => record.last_active.clone(),
            SortField::EstSavings => record.est_savings_usd.to_string(),
        };
        raw.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// A user-chosen column and direction. Replaces the default ordering outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDirective {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Next directive after the user clicks `field`.
    ///
    /// Same field flips direction; a different field starts ascending.
    pub fn toggle(current: Option<SortDirective>, field: SortField) -> SortDirective {
        match current {
            Some(d) if d.field == field => SortDirective {
                field,
                direction: d.direction.flipped(),
            },
            _ => SortDirective::ascending(field),
        }
    }

    /// Parse `field` or `field:asc|desc`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, direction) = match raw.split_once(':') {
            Some((f, d)) => (f, d.trim().to_ascii_lowercase()),
            None => (raw, "asc".to_string()),
        };
        let field = SortField::from_key(field)?;
        let direction = match direction.as_str() {
            "asc" | "ascending" => SortDirection::Ascending,
            "desc" | "descending" => SortDirection::Descending,
            _ => return None,
        };
        Some(Self { field, direction })
    }
}

/// Presentation tags so renderers never re-derive the badge rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFlags {
    /// `name` is the "Possibly Terminated" sentinel.
    pub possibly_terminated: bool,
    /// `statusName` is "Unknown" or "Terminated".
    pub status_flagged: bool,
    /// `recommendedAction` is exactly "Analyst".
    pub analyst: bool,
}

impl RowFlags {
    pub fn for_record(record: &LicenseRecord) -> Self {
        Self {
            possibly_terminated: record.is_possibly_terminated(),
            status_flagged: record.has_flagged_status(),
            analyst: record.is_analyst(),
        }
    }

    pub fn any(&self) -> bool {
        self.possibly_terminated || self.status_flagged || self.analyst
    }
}

/// One display row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRow {
    /// Position of the record in the canonical (unfiltered) list.
    pub source_index: usize,
    /// `user`, or `user#n` for a repeat of the same login. Unique per batch.
    pub row_key: String,
    pub flags: RowFlags,
    pub record: LicenseRecord,
}

/// Case-insensitive substring match on name, email, or user.
///
/// The query is trimmed; a blank query matches everything.
pub fn matches_query(record: &LicenseRecord, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [&record.name, &record.email, &record.user]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Stable, unique keys per canonical position.
///
/// The first occurrence of a login keys on the login itself. Repeats get a
/// `#n` suffix, skipping any `n` whose key is already some row's login.
fn row_keys(records: &[LicenseRecord]) -> Vec<String> {
    let logins: HashSet<&str> = records.iter().map(|r| r.user.as_str()).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(records.len());
    let mut repeats: HashMap<&str, usize> = HashMap::new();
    records
        .iter()
        .map(|r| {
            let user = r.user.as_str();
            if taken.insert(user.to_string()) {
                return user.to_string();
            }
            let n = repeats.entry(user).or_insert(1);
            loop {
                *n += 1;
                let key = format!("{}#{}", user, n);
                if !logins.contains(key.as_str()) && taken.insert(key.clone()) {
                    return key;
                }
            }
        })
        .collect()
}

/// Filter then order `records` for display.
pub fn rank(
    records: &[LicenseRecord],
    search_text: &str,
    explicit_sort: Option<SortDirective>,
) -> Vec<RankedRow> {
    let keys = row_keys(records);
    let mut candidates: Vec<usize> = (0..records.len())
        .filter(|&i| matches_query(&records[i], search_text))
        .collect();

    match explicit_sort {
        None => default_order(records, &mut candidates),
        Some(directive) => explicit_order(records, &mut candidates, directive),
    }

    candidates
        .into_iter()
        .map(|i| RankedRow {
            source_index: i,
            row_key: keys[i].clone(),
            flags: RowFlags::for_record(&records[i]),
            record: records[i].clone(),
        })
        .collect()
}

/// Analyst group first, then everyone else; each by user, case-insensitive.
fn default_order(records: &[LicenseRecord], indices: &mut Vec<usize>) {
    let (mut analysts, mut others): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| records[i].is_analyst());

    analysts.sort_by_cached_key(|&i| records[i].user.to_lowercase());
    others.sort_by_cached_key(|&i| records[i].user.to_lowercase());

    indices.clear();
    indices.extend(analysts);
    indices.extend(others);
}

fn explicit_order(records: &[LicenseRecord], indices: &mut [usize], directive: SortDirective) {
    let mut keyed: Vec<(String, usize)> = indices
        .iter()
        .map(|&i| (directive.field.sort_key(&records[i]), i))
        .collect();

    // `sort_by` is stable, so reversing the comparator keeps ties in input order.
    keyed.sort_by(|a, b| {
        let ord: Ordering = a.0.cmp(&b.0);
        match directive.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });

    for (slot, (_, i)) in indices.iter_mut().zip(keyed) {
        *slot = i;
    }
}
