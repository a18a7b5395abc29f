//! Suggestion Cache: persisted `(tenant, subject, skill)` entries.
//!
//! The lifecycle rules live on `SuggestionEntry`; backends only provide the
//! per-key atomicity around them. A decided entry is never overwritten by a
//! refresh, and a conflicting decision leaves the stored entry untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use figura_core::{SkillId, Subject, TenantId};
use figura_suggestions::{Decision, DecisionOutcome, Readiness, RefreshOutcome, SuggestionEntry};

use crate::error::{DecisionError, StoreError};

pub mod in_memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemorySuggestionCache;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSuggestionCache;

#[async_trait]
pub trait SuggestionCache: Send + Sync {
    /// Create or refresh a pending entry; decided entries are skipped.
    async fn upsert_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<RefreshOutcome, StoreError>;

    /// Apply a decision. A missing entry is `NoLongerAvailable`.
    async fn decide(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError>;

    /// Force the entry to `accepted` for a skill added to a learning plan,
    /// creating it from `readiness` when absent.
    ///
    /// Unlike `decide`, expiry and an earlier dismissal do not block this.
    async fn record_planned(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError>;

    async fn get(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
    ) -> Result<Option<SuggestionEntry>, StoreError>;

    /// Unexpired pending entries, by score descending then skill id.
    async fn list_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionEntry>, StoreError>;

    /// Every entry of the subject regardless of status, by skill id.
    async fn entries_for(&self, tenant_id: TenantId, subject: Subject) -> Result<Vec<SuggestionEntry>, StoreError>;

    /// Delete pending entries whose skill is not in `keep`. Returns the count.
    ///
    /// Decided entries are never removed here.
    async fn retain_candidates(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        keep: &[SkillId],
    ) -> Result<u64, StoreError>;

    async fn mark_accepted(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Accept, now).await
    }

    async fn mark_dismissed(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Dismiss, now).await
    }

    async fn reset(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Reset, now).await
    }
}

#[async_trait]
impl<S> SuggestionCache for Arc<S>
where
    S: SuggestionCache + ?Sized,
{
    async fn upsert_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<RefreshOutcome, StoreError> {
        (**self).upsert_pending(tenant_id, subject, skill_id, readiness, now, ttl).await
    }

    async fn decide(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        (**self).decide(tenant_id, subject, skill_id, decision, now).await
    }

    async fn record_planned(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        (**self).record_planned(tenant_id, subject, skill_id, readiness, now).await
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
    ) -> Result<Option<SuggestionEntry>, StoreError> {
        (**self).get(tenant_id, subject, skill_id).await
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionEntry>, StoreError> {
        (**self).list_pending(tenant_id, subject, now).await
    }

    async fn entries_for(&self, tenant_id: TenantId, subject: Subject) -> Result<Vec<SuggestionEntry>, StoreError> {
        (**self).entries_for(tenant_id, subject).await
    }

    async fn retain_candidates(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        keep: &[SkillId],
    ) -> Result<u64, StoreError> {
        (**self).retain_candidates(tenant_id, subject, keep).await
    }
}

/// Ordering of the learner-facing list.
pub(crate) fn sort_for_listing(entries: &mut [SuggestionEntry]) {
    entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.skill_id.cmp(&b.skill_id)));
}
