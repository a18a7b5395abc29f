use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use figura_core::{SkillId, Subject, TenantId};
use figura_suggestions::{
    CompletionState, Decision, DecisionOutcome, NotApplicable, Readiness, Score, SuggestionEntry,
    SuggestionStatus, TransitionError,
};

use super::prerequisites::SkillRef;
use super::scoring::{ScoreCalculator, ScoreError};
use crate::error::{DecisionError, SourceError, StoreError};
use crate::graph_store::PrerequisiteStore;
use crate::sources::Sources;
use crate::suggestion_cache::SuggestionCache;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuggestionError {
    #[error("skill {0} not found")]
    SkillNotFound(SkillId),

    #[error("{0} not found")]
    SubjectNotFound(Subject),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("skill cannot be scored: {0}")]
    NotApplicable(#[from] NotApplicable),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<DecisionError> for SuggestionError {
    fn from(value: DecisionError) -> Self {
        match value {
            DecisionError::Transition(e) => SuggestionError::InvalidTransition(e),
            DecisionError::Store(e) => SuggestionError::Store(e),
        }
    }
}

impl From<ScoreError> for SuggestionError {
    fn from(value: ScoreError) -> Self {
        match value {
            ScoreError::Store(e) => SuggestionError::Store(e),
            ScoreError::Source(e) => SuggestionError::Source(e),
            ScoreError::NotApplicable(e) => SuggestionError::NotApplicable(e),
        }
    }
}

/// A cached suggestion as shown to learners and instructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionView {
    pub skill: SkillRef,
    pub score: Score,
    pub satisfied_count: u32,
    pub required_total: u32,
    pub status: SuggestionStatus,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SuggestionView {
    fn new(entry: &SuggestionEntry, names: &HashMap<SkillId, String>) -> Self {
        Self {
            skill: SkillRef {
                id: entry.skill_id,
                name: names.get(&entry.skill_id).cloned(),
            },
            score: entry.score,
            satisfied_count: entry.satisfied_count,
            required_total: entry.required_total,
            status: entry.status,
            updated_at: entry.updated_at,
            expires_at: entry.expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteRow {
    pub skill: SkillRef,
    pub order: u32,
    pub required: bool,
    pub weight: u8,
    pub state: CompletionState,
}

/// Detail view: the cached entry (if any is live) plus what is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionDetail {
    pub skill: SkillRef,
    pub suggestion: Option<SuggestionView>,
    pub prerequisites: Vec<PrerequisiteRow>,
}

/// Notification from the learning-plan subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChange {
    pub subject: Subject,
    pub skill_id: SkillId,
    pub change: PlanChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeKind {
    Added,
    Removed,
}

impl PlanChangeKind {
    pub fn decision(self) -> Decision {
        match self {
            PlanChangeKind::Added => Decision::Accept,
            PlanChangeKind::Removed => Decision::Reset,
        }
    }
}

/// Learner/group-facing reads and decisions. Never computes scores.
#[derive(Clone)]
pub struct SuggestionService {
    cache: Arc<dyn SuggestionCache>,
    sources: Sources,
    calculator: ScoreCalculator,
}

impl core::fmt::Debug for SuggestionService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuggestionService").finish_non_exhaustive()
    }
}

impl SuggestionService {
    pub fn new(cache: Arc<dyn SuggestionCache>, store: Arc<dyn PrerequisiteStore>, sources: Sources) -> Self {
        let calculator = ScoreCalculator::new(store, sources.progression.clone());
        Self {
            cache,
            sources,
            calculator,
        }
    }

    /// Groups must exist in the directory; learners are the authenticated principal.
    pub async fn ensure_subject(&self, tenant_id: TenantId, subject: Subject) -> Result<(), SuggestionError> {
        if matches!(subject, Subject::Learner(_)) {
            return Ok(());
        }
        if self.sources.directory.contains(tenant_id, subject).await? {
            Ok(())
        } else {
            Err(SuggestionError::SubjectNotFound(subject))
        }
    }

    /// Pending, unexpired suggestions, best first.
    pub async fn list_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionView>, SuggestionError> {
        let entries = self.cache.list_pending(tenant_id, subject, now).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let names = self.sources.skill_names(tenant_id).await?;
        Ok(entries.iter().map(|e| SuggestionView::new(e, &names)).collect())
    }

    pub async fn detail(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<SuggestionDetail, SuggestionError> {
        if self.sources.catalog.skill(tenant_id, skill_id).await?.is_none() {
            return Err(SuggestionError::SkillNotFound(skill_id));
        }
        let names = self.sources.skill_names(tenant_id).await?;

        let suggestion = self
            .cache
            .get(tenant_id, subject, skill_id)
            .await?
            .filter(|e| !e.is_expired(now))
            .map(|e| SuggestionView::new(&e, &names));

        let prerequisites = self
            .calculator
            .breakdown(tenant_id, subject, skill_id)
            .await?
            .into_iter()
            .map(|p| PrerequisiteRow {
                skill: SkillRef {
                    id: p.skill_id,
                    name: names.get(&p.skill_id).cloned(),
                },
                order: p.order,
                required: p.required,
                weight: p.weight,
                state: p.state,
            })
            .collect();

        Ok(SuggestionDetail {
            skill: SkillRef {
                id: skill_id,
                name: names.get(&skill_id).cloned(),
            },
            suggestion,
            prerequisites,
        })
    }

    #[instrument(skip(self, now), fields(tenant = %tenant_id, subject = %subject, skill = %skill_id))]
    pub async fn decide(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, SuggestionError> {
        let outcome = self.cache.decide(tenant_id, subject, skill_id, decision, now).await?;
        info!(?decision, outcome = outcome.as_str(), "suggestion decision");
        Ok(outcome)
    }

    pub async fn accept(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, SuggestionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Accept, now).await
    }

    pub async fn dismiss(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, SuggestionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Dismiss, now).await
    }

    /// Return a dismissed or accepted suggestion to pending.
    pub async fn restore(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, SuggestionError> {
        self.decide(tenant_id, subject, skill_id, Decision::Reset, now).await
    }

    /// A skill was added to or removed from a learning plan.
    ///
    /// An addition is recorded as accepted even when no live suggestion
    /// exists, so the refresher never proposes a planned skill again. A
    /// removal resets the entry to pending like a learner restore.
    #[instrument(skip(self, now), fields(tenant = %tenant_id, subject = %change.subject, skill = %change.skill_id))]
    pub async fn apply_plan_change(
        &self,
        tenant_id: TenantId,
        change: PlanChange,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, SuggestionError> {
        let PlanChange {
            subject, skill_id, ..
        } = change;
        match change.change {
            PlanChangeKind::Added => {
                let readiness = match self.calculator.compute_score(tenant_id, subject, skill_id).await {
                    Ok(readiness) => readiness,
                    Err(ScoreError::NotApplicable(_)) => Readiness::UNSCORED,
                    Err(e) => return Err(e.into()),
                };
                let outcome = self
                    .cache
                    .record_planned(tenant_id, subject, skill_id, readiness, now)
                    .await?;
                info!(outcome = outcome.as_str(), "skill added to plan");
                Ok(outcome)
            }
            PlanChangeKind::Removed => self.decide(tenant_id, subject, skill_id, Decision::Reset, now).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use figura_core::{GroupId, LearnerId};
    use figura_graph::{EdgeAttributes, EdgeKey, PrerequisiteEdge};
    use figura_suggestions::Readiness;

    use crate::graph_store::InMemoryPrerequisiteStore;
    use crate::sources::{InMemoryProgression, InMemorySkillCatalog, InMemorySubjectDirectory, SkillSummary};
    use crate::suggestion_cache::InMemorySuggestionCache;

    struct Fixture {
        tenant: TenantId,
        catalog: Arc<InMemorySkillCatalog>,
        progression: Arc<InMemoryProgression>,
        directory: Arc<InMemorySubjectDirectory>,
        store: Arc<InMemoryPrerequisiteStore>,
        cache: Arc<InMemorySuggestionCache>,
        service: SuggestionService,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemorySkillCatalog::new());
        let progression = Arc::new(InMemoryProgression::new());
        let directory = Arc::new(InMemorySubjectDirectory::new());
        let store = Arc::new(InMemoryPrerequisiteStore::new());
        let cache = Arc::new(InMemorySuggestionCache::new());
        let service = SuggestionService::new(
            cache.clone(),
            store.clone(),
            Sources::new(catalog.clone(), progression.clone(), directory.clone()),
        );
        Fixture {
            tenant: TenantId::new(),
            catalog,
            progression,
            directory,
            store,
            cache,
            service,
        }
    }

    impl Fixture {
        fn skill(&self, name: &str) -> SkillId {
            let id = SkillId::new();
            self.catalog.insert(self.tenant, SkillSummary::new(id, name));
            id
        }

        async fn seed_entry(&self, subject: Subject, skill: SkillId, hundredths: u16, now: DateTime<Utc>) {
            let readiness = Readiness {
                score: Score::from_hundredths(hundredths).unwrap(),
                satisfied_count: 1,
                required_total: 2,
            };
            self.cache
                .upsert_pending(self.tenant, subject, skill, readiness, now, Duration::hours(48))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn list_resolves_names_best_first() {
        let fx = fixture();
        let learner = Subject::Learner(LearnerId::new());
        let (poirier, roue) = (fx.skill("Poirier"), fx.skill("Roue"));
        let now = Utc::now();
        fx.seed_entry(learner, roue, 3000, now).await;
        fx.seed_entry(learner, poirier, 8000, now).await;

        let list = fx.service.list_pending(fx.tenant, learner, now).await.unwrap();
        let names: Vec<_> = list.iter().map(|v| v.skill.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Poirier", "Roue"]);
    }

    #[tokio::test]
    async fn detail_shows_breakdown_and_live_entry() {
        let fx = fixture();
        let learner = Subject::Learner(LearnerId::new());
        let (atr, gainage) = (fx.skill("ATR-mur"), fx.skill("Gainage"));
        fx.store
            .insert_checked(
                fx.tenant,
                PrerequisiteEdge::new(EdgeKey::new(atr, gainage), EdgeAttributes::new(1, true, 2)),
            )
            .await
            .unwrap();
        fx.progression.set(fx.tenant, learner, gainage, CompletionState::InProgress);
        let now = Utc::now();
        fx.seed_entry(learner, atr, 0, now).await;

        let detail = fx.service.detail(fx.tenant, learner, atr, now).await.unwrap();
        assert_eq!(detail.skill.name.as_deref(), Some("ATR-mur"));
        assert!(detail.suggestion.is_some());
        assert_eq!(detail.prerequisites.len(), 1);
        assert_eq!(detail.prerequisites[0].state, CompletionState::InProgress);
        assert_eq!(detail.prerequisites[0].skill.name.as_deref(), Some("Gainage"));

        let later = now + Duration::days(5);
        let detail = fx.service.detail(fx.tenant, learner, atr, later).await.unwrap();
        assert!(detail.suggestion.is_none());

        let unknown = SkillId::new();
        assert_eq!(
            fx.service.detail(fx.tenant, learner, unknown, now).await,
            Err(SuggestionError::SkillNotFound(unknown))
        );
    }

    #[tokio::test]
    async fn plan_events_drive_accept_and_reset() {
        let fx = fixture();
        let learner = Subject::Learner(LearnerId::new());
        let skill = fx.skill("Flip");
        let now = Utc::now();
        fx.seed_entry(learner, skill, 5000, now).await;

        let added = PlanChange {
            subject: learner,
            skill_id: skill,
            change: PlanChangeKind::Added,
        };
        assert_eq!(fx.service.apply_plan_change(fx.tenant, added, now).await, Ok(DecisionOutcome::Applied));
        assert_eq!(fx.service.apply_plan_change(fx.tenant, added, now).await, Ok(DecisionOutcome::Unchanged));
        assert!(fx.service.list_pending(fx.tenant, learner, now).await.unwrap().is_empty());

        let removed = PlanChange {
            change: PlanChangeKind::Removed,
            ..added
        };
        assert_eq!(fx.service.apply_plan_change(fx.tenant, removed, now).await, Ok(DecisionOutcome::Applied));
        assert_eq!(fx.service.list_pending(fx.tenant, learner, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dismissed_then_accepted_is_invalid() {
        let fx = fixture();
        let learner = Subject::Learner(LearnerId::new());
        let skill = fx.skill("Salto");
        let now = Utc::now();
        fx.seed_entry(learner, skill, 5000, now).await;

        fx.service.dismiss(fx.tenant, learner, skill, now).await.unwrap();
        assert!(matches!(
            fx.service.accept(fx.tenant, learner, skill, now).await,
            Err(SuggestionError::InvalidTransition(_))
        ));
        assert_eq!(fx.service.restore(fx.tenant, learner, skill, now).await, Ok(DecisionOutcome::Applied));
        assert_eq!(fx.service.accept(fx.tenant, learner, skill, now).await, Ok(DecisionOutcome::Applied));
    }

    #[tokio::test]
    async fn unknown_group_is_rejected() {
        let fx = fixture();
        let known = GroupId::new();
        fx.directory.add_group(fx.tenant, known, true);
        assert!(fx.service.ensure_subject(fx.tenant, Subject::Group(known)).await.is_ok());
        let ghost = Subject::Group(GroupId::new());
        assert_eq!(
            fx.service.ensure_subject(fx.tenant, ghost).await,
            Err(SuggestionError::SubjectNotFound(ghost))
        );
    }

    #[tokio::test]
    async fn plan_addition_without_live_suggestion_is_recorded() {
        let fx = fixture();
        let learner = Subject::Learner(LearnerId::new());
        let (expired, fresh) = (fx.skill("Rondade"), fx.skill("Souplesse avant"));
        let now = Utc::now();
        fx.seed_entry(learner, expired, 4000, now - Duration::days(5)).await;

        for skill in [expired, fresh] {
            let added = PlanChange {
                subject: learner,
                skill_id: skill,
                change: PlanChangeKind::Added,
            };
            assert_eq!(fx.service.apply_plan_change(fx.tenant, added, now).await, Ok(DecisionOutcome::Applied));
            let entry = fx.cache.get(fx.tenant, learner, skill).await.unwrap().unwrap();
            assert_eq!(entry.status, SuggestionStatus::Accepted);
        }
        let unscored = fx.cache.get(fx.tenant, learner, fresh).await.unwrap().unwrap();
        assert_eq!(unscored.readiness(), Readiness::UNSCORED);

        // Learner decisions keep the lifecycle rules.
        let other = fx.skill("Saut de main");
        fx.seed_entry(learner, other, 4000, now - Duration::days(5)).await;
        assert_eq!(
            fx.service.accept(fx.tenant, learner, other, now).await,
            Ok(DecisionOutcome::NoLongerAvailable)
        );
    }

    #[test]
    fn unscorable_skill_is_not_a_store_failure() {
        let err = SuggestionError::from(ScoreError::NotApplicable(NotApplicable::NoRequiredPrerequisites));
        assert_eq!(err, SuggestionError::NotApplicable(NotApplicable::NoRequiredPrerequisites));
    }
}
