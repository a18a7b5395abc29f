use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use figura_core::{GroupId, LearnerId, SkillId, Subject, TenantId};
use figura_suggestions::CompletionState;

use super::{ProgressionReader, SkillCatalog, SkillSummary, SubjectDirectory};
use crate::error::SourceError;

fn poisoned(source_name: &'static str) -> SourceError {
    SourceError::unavailable(source_name, "lock poisoned")
}

/// In-memory skill catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySkillCatalog {
    inner: RwLock<HashMap<TenantId, BTreeMap<SkillId, SkillSummary>>>,
}

impl InMemorySkillCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: TenantId, skill: SkillSummary) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().insert(skill.id, skill);
        }
    }

    pub fn remove(&self, tenant_id: TenantId, skill_id: SkillId) {
        if let Ok(mut map) = self.inner.write() {
            if let Some(skills) = map.get_mut(&tenant_id) {
                skills.remove(&skill_id);
            }
        }
    }
}

#[async_trait]
impl SkillCatalog for InMemorySkillCatalog {
    async fn skill(&self, tenant_id: TenantId, skill_id: SkillId) -> Result<Option<SkillSummary>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("skill catalog"))?;
        Ok(map.get(&tenant_id).and_then(|skills| skills.get(&skill_id)).cloned())
    }

    async fn skills(&self, tenant_id: TenantId) -> Result<Vec<SkillSummary>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("skill catalog"))?;
        Ok(map
            .get(&tenant_id)
            .map(|skills| skills.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory progression reader for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProgression {
    inner: RwLock<HashMap<(TenantId, Subject, SkillId), CompletionState>>,
}

impl InMemoryProgression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant_id: TenantId, subject: Subject, skill_id: SkillId, state: CompletionState) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, subject, skill_id), state);
        }
    }
}

#[async_trait]
impl ProgressionReader for InMemoryProgression {
    async fn completion(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skills: &[SkillId],
    ) -> Result<HashMap<SkillId, CompletionState>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("progression"))?;
        Ok(skills
            .iter()
            .filter_map(|skill| map.get(&(tenant_id, subject, *skill)).map(|state| (*skill, *state)))
            .collect())
    }
}

#[derive(Debug, Default)]
struct TenantSubjects {
    learners: BTreeSet<LearnerId>,
    /// Group id -> active flag.
    groups: BTreeMap<GroupId, bool>,
}

/// In-memory subject directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySubjectDirectory {
    inner: RwLock<BTreeMap<TenantId, TenantSubjects>>,
}

impl InMemorySubjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default();
        }
    }

    pub fn add_learner(&self, tenant_id: TenantId, learner_id: LearnerId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().learners.insert(learner_id);
        }
    }

    pub fn add_group(&self, tenant_id: TenantId, group_id: GroupId, active: bool) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().groups.insert(group_id, active);
        }
    }
}

#[async_trait]
impl SubjectDirectory for InMemorySubjectDirectory {
    async fn tenants(&self) -> Result<Vec<TenantId>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("subject directory"))?;
        Ok(map.keys().copied().collect())
    }

    async fn subjects(&self, tenant_id: TenantId) -> Result<Vec<Subject>, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("subject directory"))?;
        let Some(tenant) = map.get(&tenant_id) else {
            return Ok(Vec::new());
        };
        let mut subjects: Vec<Subject> = tenant.learners.iter().copied().map(Subject::Learner).collect();
        subjects.extend(
            tenant
                .groups
                .iter()
                .filter(|(_, active)| **active)
                .map(|(group, _)| Subject::Group(*group)),
        );
        subjects.sort();
        Ok(subjects)
    }

    async fn contains(&self, tenant_id: TenantId, subject: Subject) -> Result<bool, SourceError> {
        let map = self.inner.read().map_err(|_| poisoned("subject directory"))?;
        let Some(tenant) = map.get(&tenant_id) else {
            return Ok(false);
        };
        Ok(match subject {
            Subject::Learner(id) => tenant.learners.contains(&id),
            Subject::Group(id) => tenant.groups.contains_key(&id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_is_tenant_isolated() {
        let catalog = InMemorySkillCatalog::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let skill = SkillSummary::new(SkillId::new(), "Poirier");
        catalog.insert(t1, skill.clone());

        assert_eq!(catalog.skill(t1, skill.id).await.unwrap(), Some(skill.clone()));
        assert_eq!(catalog.skill(t2, skill.id).await.unwrap(), None);
        assert!(catalog.skills(t2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progression_returns_only_known_states() {
        let progression = InMemoryProgression::new();
        let tenant = TenantId::new();
        let subject = Subject::Learner(LearnerId::new());
        let (a, b) = (SkillId::new(), SkillId::new());
        progression.set(tenant, subject, a, CompletionState::Satisfied);

        let states = progression.completion(tenant, subject, &[a, b]).await.unwrap();
        assert_eq!(states.get(&a), Some(&CompletionState::Satisfied));
        assert!(!states.contains_key(&b));
    }

    #[tokio::test]
    async fn inactive_groups_are_not_refresh_subjects() {
        let directory = InMemorySubjectDirectory::new();
        let tenant = TenantId::new();
        let (active, inactive) = (GroupId::new(), GroupId::new());
        let learner = LearnerId::new();
        directory.add_group(tenant, active, true);
        directory.add_group(tenant, inactive, false);
        directory.add_learner(tenant, learner);

        let subjects = directory.subjects(tenant).await.unwrap();
        assert_eq!(subjects, vec![Subject::Learner(learner), Subject::Group(active)]);
        assert!(directory.contains(tenant, Subject::Group(inactive)).await.unwrap());
        assert_eq!(directory.tenants().await.unwrap(), vec![tenant]);
    }
}
