//! Fetch coordinator: owns the interactive session and applies fetch results.
//!
//! Every record fetch is keyed by the selection that started it plus a
//! monotonically increasing sequence number. A result is committed only if
//! that key still matches the live selection when it resolves; anything else
//! is a stale result and is dropped without touching visible state.
//!
//! The session lock is never held across an await, so concurrent fetches are
//! allowed while commits stay serialized.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{FetchFailure, LicenseError};
use crate::gateway::LicenseSource;
use crate::ranking::{rank, RankedRow, SortDirective, SortField};
use crate::summary::{summarize, Summary};
use crate::types::{CostCenter, LicenseRecord};

/// Lifecycle of the record batch for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoadPhase {
    Idle,
    #[serde(rename_all = "camelCase")]
    Loading { cost_center: CostCenter },
    #[serde(rename_all = "camelCase")]
    Loaded { cost_center: CostCenter },
    #[serde(rename_all = "camelCase")]
    Failed {
        cost_center: CostCenter,
        failure: FetchFailure,
    },
}

/// Key for one in-flight record fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub cost_center: CostCenter,
    pub seq: u64,
}

/// What happened to a resolved fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The selection moved on; the result was discarded.
    Stale,
}

/// Snapshot of everything the table renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub selection: Option<CostCenter>,
    pub phase: LoadPhase,
    pub rows: Vec<RankedRow>,
    pub summary: Summary,
    pub search_text: String,
    pub explicit_sort: Option<SortDirective>,
}

impl TableView {
    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.phase {
            LoadPhase::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

struct CachedCostCenters {
    names: Vec<CostCenter>,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct Session {
    selection: Option<CostCenter>,
    seq: u64,
    phase: Option<LoadPhase>,
    /// Canonical records, replaced wholesale on every applied success.
    records: Vec<LicenseRecord>,
    /// Selection the current `records` were loaded for.
    records_for: Option<CostCenter>,
    search_text: String,
    explicit_sort: Option<SortDirective>,
    cost_centers: Option<CachedCostCenters>,
}

impl Session {
    fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.seq == ticket.seq && self.selection.as_deref() == Some(ticket.cost_center.as_str())
    }

    fn next_ticket(&mut self, cost_center: CostCenter) -> FetchTicket {
        self.seq += 1;
        self.phase = Some(LoadPhase::Loading {
            cost_center: cost_center.clone(),
        });
        FetchTicket {
            cost_center,
            seq: self.seq,
        }
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    source: Arc<dyn LicenseSource>,
    session: Arc<Mutex<Session>>,
    cost_center_ttl: chrono::Duration,
}

impl FetchCoordinator {
    pub fn new(source: Arc<dyn LicenseSource>, cost_center_ttl_minutes: u32) -> Self {
        Self {
            source,
            session: Arc::new(Mutex::new(Session::default())),
            cost_center_ttl: chrono::Duration::minutes(cost_center_ttl_minutes as i64),
        }
    }

    // ------------------------------------------------------------------
    // Selection lifecycle
    // ------------------------------------------------------------------

    /// Change the selection and hand back the ticket the fetch must carry.
    ///
    /// A new cost center resets search text and explicit sort and discards
    /// the old records. Re-selecting the current value is a no-op (`None`).
    pub fn begin_selection(&self, cost_center: &str) -> Option<FetchTicket> {
        let cost_center = cost_center.trim();
        if cost_center.is_empty() {
            self.clear_selection();
            return None;
        }

        let mut session = self.session.lock();
        if session.selection.as_deref() == Some(cost_center) {
            return None;
        }

        session.selection = Some(cost_center.to_string());
        session.records = Vec::new();
        session.records_for = None;
        session.search_text.clear();
        session.explicit_sort = None;
        let ticket = session.next_ticket(cost_center.to_string());
        log::info!(
            "Coordinator: loading {} (seq {})",
            ticket.cost_center,
            ticket.seq
        );
        Some(ticket)
    }

    /// Back to `Idle`: no selection, nothing fetched, any in-flight result stale.
    pub fn clear_selection(&self) {
        let mut session = self.session.lock();
        session.seq += 1;
        session.selection = None;
        session.phase = None;
        session.records = Vec::new();
        session.records_for = None;
        session.search_text.clear();
        session.explicit_sort = None;
    }

    /// Commit a resolved fetch if its ticket still matches the live selection.
    pub fn complete(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<LicenseRecord>, LicenseError>,
    ) -> ApplyOutcome {
        let mut session = self.session.lock();
        if !session.is_current(ticket) {
            log::debug!(
                "Coordinator: discarding stale result for {} (seq {}, live seq {})",
                ticket.cost_center,
                ticket.seq,
                session.seq
            );
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(records) => {
                log::info!(
                    "Coordinator: loaded {} rows for {}",
                    records.len(),
                    ticket.cost_center
                );
                session.records = records;
                session.records_for = Some(ticket.cost_center.clone());
                session.phase = Some(LoadPhase::Loaded {
                    cost_center: ticket.cost_center.clone(),
                });
            }
            Err(err) => {
                log::warn!(
                    "Coordinator: fetch for {} failed: {}",
                    ticket.cost_center,
                    err
                );
                session.phase = Some(LoadPhase::Failed {
                    cost_center: ticket.cost_center.clone(),
                    failure: FetchFailure::from(&err),
                });
            }
        }
        ApplyOutcome::Applied
    }

    async fn run_fetch(&self, ticket: FetchTicket) -> ApplyOutcome {
        let result = self.source.fetch_records(&ticket.cost_center).await;
        self.complete(&ticket, result)
    }

    /// Select a cost center and load its records.
    ///
    /// Returns `None` when the selection did not change.
    pub async fn select(&self, cost_center: &str) -> Option<ApplyOutcome> {
        let ticket = self.begin_selection(cost_center)?;
        Some(self.run_fetch(ticket).await)
    }

    /// Same as `select`, but the fetch runs as a spawned task.
    pub fn select_in_background(
        &self,
        cost_center: &str,
    ) -> Option<tokio::task::JoinHandle<ApplyOutcome>> {
        let ticket = self.begin_selection(cost_center)?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run_fetch(ticket).await }))
    }

    /// Re-issue the fetch for the current selection.
    ///
    /// Records from an earlier success for the same selection stay visible
    /// until the new result lands.
    pub async fn retry(&self) -> Option<ApplyOutcome> {
        let ticket = {
            let mut session = self.session.lock();
            let cost_center = session.selection.clone()?;
            let ticket = session.next_ticket(cost_center);
            log::info!(
                "Coordinator: retrying {} (seq {})",
                ticket.cost_center,
                ticket.seq
            );
            ticket
        };
        Some(self.run_fetch(ticket).await)
    }

    // ------------------------------------------------------------------
    // Query / sort state
    // ------------------------------------------------------------------

    pub fn set_search_text(&self, text: &str) {
        self.session.lock().search_text = text.to_string();
    }

    /// Apply a column click and return the directive now in effect.
    pub fn toggle_sort(&self, field: SortField) -> SortDirective {
        let mut session = self.session.lock();
        let next = SortDirective::toggle(session.explicit_sort, field);
        session.explicit_sort = Some(next);
        next
    }

    pub fn set_sort(&self, directive: Option<SortDirective>) {
        self.session.lock().explicit_sort = directive;
    }

    /// Back to default ordering; search text is left alone.
    pub fn reset_sort(&self) {
        self.session.lock().explicit_sort = None;
    }

    pub fn selection(&self) -> Option<CostCenter> {
        self.session.lock().selection.clone()
    }

    pub fn view(&self) -> TableView {
        let session = self.session.lock();
        let records: &[LicenseRecord] = if session.records_for == session.selection {
            &session.records
        } else {
            &[]
        };
        TableView {
            selection: session.selection.clone(),
            phase: session.phase.clone().unwrap_or(LoadPhase::Idle),
            rows: rank(records, &session.search_text, session.explicit_sort),
            summary: summarize(records),
            search_text: session.search_text.clone(),
            explicit_sort: session.explicit_sort,
        }
    }

    // ------------------------------------------------------------------
    // Cost centers
    // ------------------------------------------------------------------

    /// Cached cost-center list, refetched once it is older than the TTL.
    pub async fn cost_centers(&self) -> Result<Vec<CostCenter>, LicenseError> {
        {
            let session = self.session.lock();
            if let Some(cached) = &session.cost_centers {
                if Utc::now() - cached.fetched_at < self.cost_center_ttl {
                    return Ok(cached.names.clone());
                }
            }
        }

        log::info!("Coordinator: refreshing cost centers");
        let names = self.source.fetch_cost_centers().await?;
        self.session.lock().cost_centers = Some(CachedCostCenters {
            names: names.clone(),
            fetched_at: Utc::now(),
        });
        Ok(names)
    }

    /// Force the next `cost_centers` call to hit the source.
    pub fn invalidate_cost_centers(&self) {
        self.session.lock().cost_centers = None;
    }
}
