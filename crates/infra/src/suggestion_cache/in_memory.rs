use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use figura_core::{SkillId, Subject, TenantId};
use figura_suggestions::{Decision, DecisionOutcome, Readiness, RefreshOutcome, SuggestionEntry};

use super::{sort_for_listing, SuggestionCache};
use crate::error::{DecisionError, StoreError};

/// Entries of one subject, by skill id.
type SubjectEntries = BTreeMap<SkillId, SuggestionEntry>;

/// In-memory suggestion cache for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySuggestionCache {
    inner: RwLock<BTreeMap<(TenantId, Subject), SubjectEntries>>,
}

impl InMemorySuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across tenants (tests/diagnostics).
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .map(|m| m.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("suggestion cache lock poisoned".to_string())
}

#[async_trait]
impl SuggestionCache for InMemorySuggestionCache {
    async fn upsert_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<RefreshOutcome, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let entries = map.entry((tenant_id, subject)).or_default();
        match entries.get_mut(&skill_id) {
            Some(entry) => Ok(entry.refresh(readiness, now, ttl)),
            None => {
                let entry = SuggestionEntry::pending(tenant_id, subject, skill_id, readiness, now, ttl);
                entries.insert(skill_id, entry);
                Ok(RefreshOutcome::Created)
            }
        }
    }

    async fn decide(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map
            .get_mut(&(tenant_id, subject))
            .and_then(|entries| entries.get_mut(&skill_id))
        {
            Some(entry) => Ok(entry.decide(decision, now)?),
            None => Ok(DecisionOutcome::NoLongerAvailable),
        }
    }

    async fn record_planned(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let entries = map.entry((tenant_id, subject)).or_default();
        match entries.get_mut(&skill_id) {
            Some(entry) => Ok(entry.mark_planned(now)),
            None => {
                let entry = SuggestionEntry::planned(tenant_id, subject, skill_id, readiness, now);
                entries.insert(skill_id, entry);
                Ok(DecisionOutcome::Applied)
            }
        }
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
    ) -> Result<Option<SuggestionEntry>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id, subject))
            .and_then(|entries| entries.get(&skill_id))
            .cloned())
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionEntry>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut out: Vec<SuggestionEntry> = map
            .get(&(tenant_id, subject))
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|e| e.is_listed(now))
            .cloned()
            .collect();
        sort_for_listing(&mut out);
        Ok(out)
    }

    async fn entries_for(&self, tenant_id: TenantId, subject: Subject) -> Result<Vec<SuggestionEntry>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(tenant_id, subject))
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn retain_candidates(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        keep: &[SkillId],
    ) -> Result<u64, StoreError> {
        let keep: HashSet<SkillId> = keep.iter().copied().collect();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(entries) = map.get_mut(&(tenant_id, subject)) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|skill, entry| entry.status.is_decided() || keep.contains(skill));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figura_core::LearnerId;
    use figura_suggestions::{Score, SuggestionStatus, TransitionError};

    fn readiness(hundredths: u16) -> Readiness {
        Readiness {
            score: Score::from_hundredths(hundredths).unwrap(),
            satisfied_count: 1,
            required_total: 2,
        }
    }

    fn ttl() -> Duration {
        Duration::hours(48)
    }

    #[tokio::test]
    async fn upsert_creates_then_refreshes() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject, skill) = (TenantId::new(), Subject::Learner(LearnerId::new()), SkillId::new());
        let now = Utc::now();

        assert_eq!(
            cache.upsert_pending(tenant, subject, skill, readiness(5000), now, ttl()).await.unwrap(),
            RefreshOutcome::Created
        );
        assert_eq!(
            cache.upsert_pending(tenant, subject, skill, readiness(7500), now, ttl()).await.unwrap(),
            RefreshOutcome::Refreshed
        );
        let entry = cache.get(tenant, subject, skill).await.unwrap().unwrap();
        assert_eq!(entry.score.hundredths(), 7500);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn accepted_entry_survives_refresh() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject, skill) = (TenantId::new(), Subject::Learner(LearnerId::new()), SkillId::new());
        let now = Utc::now();
        cache.upsert_pending(tenant, subject, skill, readiness(8500), now, ttl()).await.unwrap();
        assert_eq!(
            cache.mark_accepted(tenant, subject, skill, now).await.unwrap(),
            DecisionOutcome::Applied
        );

        let outcome = cache
            .upsert_pending(tenant, subject, skill, readiness(10_000), now + Duration::hours(1), ttl())
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped(SuggestionStatus::Accepted));
        let entry = cache.get(tenant, subject, skill).await.unwrap().unwrap();
        assert_eq!(entry.status, SuggestionStatus::Accepted);
        assert_eq!(entry.score.hundredths(), 8500);
    }

    #[tokio::test]
    async fn dismissed_entry_leaves_list_and_conflicting_accept_fails() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject, skill) = (TenantId::new(), Subject::Learner(LearnerId::new()), SkillId::new());
        let now = Utc::now();
        cache.upsert_pending(tenant, subject, skill, readiness(4000), now, ttl()).await.unwrap();

        cache.mark_dismissed(tenant, subject, skill, now).await.unwrap();
        assert!(cache.list_pending(tenant, subject, now).await.unwrap().is_empty());

        let err = cache.mark_accepted(tenant, subject, skill, now).await.unwrap_err();
        assert!(matches!(err, DecisionError::Transition(TransitionError::InvalidTransition { .. })));
        assert_eq!(
            cache.get(tenant, subject, skill).await.unwrap().unwrap().status,
            SuggestionStatus::Dismissed
        );

        assert_eq!(cache.reset(tenant, subject, skill, now).await.unwrap(), DecisionOutcome::Applied);
        assert_eq!(cache.list_pending(tenant, subject, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_orders_by_score_and_hides_expired() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject) = (TenantId::new(), Subject::Learner(LearnerId::new()));
        let now = Utc::now();
        let (low, high, stale) = (SkillId::new(), SkillId::new(), SkillId::new());
        cache.upsert_pending(tenant, subject, low, readiness(2000), now, ttl()).await.unwrap();
        cache.upsert_pending(tenant, subject, high, readiness(9000), now, ttl()).await.unwrap();
        cache
            .upsert_pending(tenant, subject, stale, readiness(9900), now - Duration::hours(72), ttl())
            .await
            .unwrap();

        let listed: Vec<SkillId> = cache
            .list_pending(tenant, subject, now)
            .await
            .unwrap()
            .iter()
            .map(|e| e.skill_id)
            .collect();
        assert_eq!(listed, vec![high, low]);

        assert_eq!(
            cache.mark_accepted(tenant, subject, stale, now).await.unwrap(),
            DecisionOutcome::NoLongerAvailable
        );
    }

    #[tokio::test]
    async fn missing_entry_is_no_longer_available() {
        let cache = InMemorySuggestionCache::new();
        let outcome = cache
            .mark_dismissed(TenantId::new(), Subject::Learner(LearnerId::new()), SkillId::new(), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::NoLongerAvailable);
    }

    #[tokio::test]
    async fn retain_removes_only_superseded_pending_entries() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject) = (TenantId::new(), Subject::Learner(LearnerId::new()));
        let other = Subject::Learner(LearnerId::new());
        let now = Utc::now();
        let (kept, superseded, decided) = (SkillId::new(), SkillId::new(), SkillId::new());
        for skill in [kept, superseded, decided] {
            cache.upsert_pending(tenant, subject, skill, readiness(5000), now, ttl()).await.unwrap();
        }
        cache.upsert_pending(tenant, other, superseded, readiness(5000), now, ttl()).await.unwrap();
        cache.mark_accepted(tenant, subject, decided, now).await.unwrap();

        let removed = cache.retain_candidates(tenant, subject, &[kept]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get(tenant, subject, superseded).await.unwrap().is_none());
        assert!(cache.get(tenant, subject, decided).await.unwrap().is_some());
        assert!(cache.get(tenant, other, superseded).await.unwrap().is_some());
        assert_eq!(cache.entries_for(tenant, subject).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn planned_skill_is_recorded_without_a_live_suggestion() {
        let cache = InMemorySuggestionCache::new();
        let (tenant, subject) = (TenantId::new(), Subject::Learner(LearnerId::new()));
        let (expired, never_cached) = (SkillId::new(), SkillId::new());
        let now = Utc::now();
        cache
            .upsert_pending(tenant, subject, expired, readiness(6000), now - Duration::hours(72), ttl())
            .await
            .unwrap();

        assert_eq!(
            cache.record_planned(tenant, subject, expired, readiness(0), now).await.unwrap(),
            DecisionOutcome::Applied
        );
        assert_eq!(
            cache.record_planned(tenant, subject, never_cached, readiness(3000), now).await.unwrap(),
            DecisionOutcome::Applied
        );
        assert_eq!(
            cache.record_planned(tenant, subject, never_cached, readiness(3000), now).await.unwrap(),
            DecisionOutcome::Unchanged
        );

        let kept = cache.get(tenant, subject, expired).await.unwrap().unwrap();
        assert_eq!(kept.status, SuggestionStatus::Accepted);
        assert_eq!(kept.score.hundredths(), 6000);
        let created = cache.get(tenant, subject, never_cached).await.unwrap().unwrap();
        assert_eq!(created.status, SuggestionStatus::Accepted);
        assert_eq!(
            cache.upsert_pending(tenant, subject, never_cached, readiness(9000), now, ttl()).await.unwrap(),
            RefreshOutcome::Skipped(SuggestionStatus::Accepted)
        );
    }

    #[tokio::test]
    async fn reads_are_scoped_to_one_tenant() {
        let cache = InMemorySuggestionCache::new();
        let subject = Subject::Learner(LearnerId::new());
        let (a, b, skill) = (TenantId::new(), TenantId::new(), SkillId::new());
        let now = Utc::now();
        cache.upsert_pending(a, subject, skill, readiness(5000), now, ttl()).await.unwrap();
        cache.upsert_pending(b, subject, skill, readiness(7000), now, ttl()).await.unwrap();

        assert_eq!(cache.retain_candidates(a, subject, &[]).await.unwrap(), 1);
        assert!(cache.list_pending(a, subject, now).await.unwrap().is_empty());
        assert_eq!(cache.list_pending(b, subject, now).await.unwrap().len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
