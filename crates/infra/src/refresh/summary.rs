use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use figura_core::{SkillId, Subject, TenantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub skill_id: SkillId,
    pub error: String,
}

/// What one successful subject unit did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectReport {
    /// Candidates in the tenant (skills with a required prerequisite).
    pub candidates: u32,
    pub already_satisfied: u32,
    pub not_applicable: u32,
    /// Scored but beyond `max_suggestions_per_subject`.
    pub capped: u32,
    pub created: u32,
    pub refreshed: u32,
    pub skipped_decided: u32,
    pub superseded_removed: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_failures: Vec<CandidateFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubjectResult {
    Refreshed(SubjectReport),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectOutcome {
    pub tenant_id: TenantId,
    pub subject: Subject,
    pub attempts: u32,
    pub result: SubjectResult,
}

impl SubjectOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.result, SubjectResult::Failed { .. })
    }

    pub fn report(&self) -> Option<&SubjectReport> {
        match &self.result {
            SubjectResult::Refreshed(report) => Some(report),
            SubjectResult::Failed { .. } => None,
        }
    }
}

/// The tenant could not even be enumerated (snapshot, catalog, or directory failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantFailure {
    pub tenant_id: TenantId,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTotals {
    pub tenants: u32,
    pub tenants_failed: u32,
    pub subjects_processed: u32,
    pub subjects_failed: u32,
    pub candidates_failed: u32,
    pub created: u32,
    pub refreshed: u32,
    pub skipped_decided: u32,
    pub superseded_removed: u64,
}

/// Outcome of one batch run.
///
/// Apart from `run_id` and `elapsed_ms`, two runs over the same data with the
/// same `now` produce equal summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_error: Option<String>,
    pub tenant_failures: Vec<TenantFailure>,
    /// Sorted by `(tenant_id, subject)`.
    pub outcomes: Vec<SubjectOutcome>,
    pub totals: RefreshTotals,
}

impl RefreshSummary {
    pub(crate) fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            elapsed_ms: 0,
            directory_error: None,
            tenant_failures: Vec::new(),
            outcomes: Vec::new(),
            totals: RefreshTotals::default(),
        }
    }

    /// Sort and total up. Called once, at the end of the run.
    pub(crate) fn finish(&mut self, tenants: u32, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self.outcomes.sort_by_key(|o| (o.tenant_id, o.subject));
        self.tenant_failures.sort_by_key(|f| f.tenant_id);
        self.totals = self.compute_totals(tenants);
    }

    fn compute_totals(&self, tenants: u32) -> RefreshTotals {
        let mut totals = RefreshTotals {
            tenants,
            tenants_failed: self.tenant_failures.len() as u32,
            ..RefreshTotals::default()
        };
        for outcome in &self.outcomes {
            totals.subjects_processed += 1;
            match &outcome.result {
                SubjectResult::Failed { .. } => totals.subjects_failed += 1,
                SubjectResult::Refreshed(r) => {
                    totals.candidates_failed += r.candidate_failures.len() as u32;
                    totals.created += r.created;
                    totals.refreshed += r.refreshed;
                    totals.skipped_decided += r.skipped_decided;
                    totals.superseded_removed += r.superseded_removed;
                }
            }
        }
        totals
    }

    /// The part of this run that concerns one tenant, with totals recomputed.
    ///
    /// The directory error is dropped: it is not attributable to a tenant.
    pub fn for_tenant(&self, tenant_id: TenantId) -> RefreshSummary {
        let mut scoped = RefreshSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            elapsed_ms: self.elapsed_ms,
            directory_error: None,
            tenant_failures: self
                .tenant_failures
                .iter()
                .filter(|f| f.tenant_id == tenant_id)
                .cloned()
                .collect(),
            outcomes: self
                .outcomes
                .iter()
                .filter(|o| o.tenant_id == tenant_id)
                .cloned()
                .collect(),
            totals: RefreshTotals::default(),
        };
        let seen = !scoped.outcomes.is_empty() || !scoped.tenant_failures.is_empty();
        scoped.totals = scoped.compute_totals(u32::from(seen));
        scoped
    }

    pub fn outcome_for(&self, tenant_id: TenantId, subject: Subject) -> Option<&SubjectOutcome> {
        self.outcomes
            .binary_search_by_key(&(tenant_id, subject), |o| (o.tenant_id, o.subject))
            .ok()
            .map(|ix| &self.outcomes[ix])
    }

    pub fn is_clean(&self) -> bool {
        self.directory_error.is_none()
            && self.tenant_failures.is_empty()
            && self.totals.subjects_failed == 0
            && self.totals.candidates_failed == 0
    }
}

/// Shared "last summary" slot, written by the scheduler, read by the API.
#[derive(Debug, Clone, Default)]
pub struct SummaryBoard {
    inner: Arc<RwLock<Option<RefreshSummary>>>,
}

impl SummaryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot. A poisoned lock is recovered; the slot only ever
    /// holds a whole summary.
    pub fn publish(&self, summary: RefreshSummary) {
        let mut slot = self.inner.write().unwrap_or_else(|poisoned| {
            warn!("refresh summary board lock poisoned; recovering");
            poisoned.into_inner()
        });
        *slot = Some(summary);
    }

    pub fn latest(&self) -> Option<RefreshSummary> {
        let slot = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_keeps_publishing_after_a_writer_panicked() {
        let board = SummaryBoard::new();
        let slot = board.inner.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = slot.write().unwrap();
            panic!("writer crashed mid-publish");
        })
        .join();
        assert!(crashed.is_err());
        assert!(board.inner.is_poisoned());

        let run_id = Uuid::now_v7();
        board.publish(RefreshSummary::new(run_id, Utc::now()));
        assert_eq!(board.latest().map(|s| s.run_id), Some(run_id));
    }
}
