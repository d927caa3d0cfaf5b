//! Plain-text rendering of a `TableView` for the terminal.

use crate::coordinator::{LoadPhase, TableView};
use crate::ranking::RankedRow;
use crate::summary::Summary;

const HEADERS: [&str; 9] = [
    "User",
    "Name",
    "Email",
    "Department",
    "Title",
    "Status",
    "Current",
    "Recommended",
    "Est. Savings ($)",
];

/// Badge text appended to the name, status and recommendation cells.
const TERMINATED_BADGE: &str = " [!]";
const STATUS_BADGE: &str = " [?]";
const ANALYST_BADGE: &str = " *";

const LEGEND: &str = "[!] possibly terminated  [?] status Unknown/Terminated  * recommended Analyst";

fn cells(row: &RankedRow) -> [String; 9] {
    let r = &row.record;
    let mut name = r.name.clone();
    if row.flags.possibly_terminated {
        name.push_str(TERMINATED_BADGE);
    }
    let mut status = r.status_name.clone();
    if row.flags.status_flagged {
        status.push_str(STATUS_BADGE);
    }
    let mut recommended = r.recommended_action.as_str().to_string();
    if row.flags.analyst {
        recommended.push_str(ANALYST_BADGE);
    }
    [
        r.user.clone(),
        name,
        r.email.clone(),
        r.department_name.clone(),
        r.title.clone(),
        status,
        r.current_license.map(|t| t.to_string()).unwrap_or_default(),
        recommended,
        format_usd(r.est_savings_usd),
    ]
}

/// Whole dollars with thousands separators.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round().max(0.0) as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "{} users | Analyst {} ({}%) | Consumer {} ({}%) | Est. savings ${}",
        summary.total_count,
        summary.analyst_count,
        summary.analyst_pct,
        summary.consumer_count,
        summary.consumer_pct,
        format_usd(summary.total_savings_usd)
    )
}

pub fn render_table(view: &TableView) -> String {
    match &view.phase {
        LoadPhase::Idle => return "Select a cost center to load data.\n".to_string(),
        LoadPhase::Loading { cost_center } => return format!("Loading {}…\n", cost_center),
        LoadPhase::Failed { failure, .. } if view.rows.is_empty() => {
            return format!("{}\n{}\n", failure.message, failure.recovery_suggestion);
        }
        _ => {}
    }

    if view.rows.is_empty() {
        let scope = view.selection.as_deref().unwrap_or_default();
        return if view.search_text.trim().is_empty() {
            format!("No rows returned for {}.\n", scope)
        } else {
            format!("No rows in {} match \"{}\".\n", scope, view.search_text.trim())
        };
    }

    let body: Vec<[String; 9]> = view.rows.iter().map(cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &body {
        push_line(&mut out, row, &widths);
    }
    out.push_str(&render_summary(&view.summary));
    out.push('\n');
    if view.rows.iter().any(|row| row.flags.any()) {
        out.push_str(LEGEND);
        out.push('\n');
    }
    if let Some(failure) = view.failure() {
        out.push_str(&format!("Refresh failed: {}\n", failure.message));
    }
    out
}

fn push_line(out: &mut String, cells: &[String; 9], widths: &[usize; 9]) {
    let last = cells.len() - 1;
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .enumerate()
        .map(|(i, (cell, w))| {
            if i == last {
                format!("{:>w$}", cell, w = *w)
            } else {
                format!("{:<w$}", cell, w = *w)
            }
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
