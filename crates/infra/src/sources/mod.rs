//! Read-only collaborators owned by other subsystems.
//!
//! The suggestion engine never writes to these. Each trait has an in-memory
//! adapter for tests/dev and a Postgres adapter reading the owning
//! subsystem's tables (feature `postgres`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use figura_core::{SkillId, Subject, TenantId};
use figura_suggestions::CompletionState;

use crate::error::SourceError;

pub mod in_memory;
pub mod seed;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryProgression, InMemorySkillCatalog, InMemorySubjectDirectory};
pub use seed::{SeedData, TenantSeed};

/// Catalog entry as far as this engine cares: identity and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: SkillId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
}

impl SkillSummary {
    pub fn new(id: SkillId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            discipline: None,
        }
    }
}

/// Skill catalog (read-only).
#[async_trait]
pub trait SkillCatalog: Send + Sync {
    async fn skill(&self, tenant_id: TenantId, skill_id: SkillId) -> Result<Option<SkillSummary>, SourceError>;

    /// All active skills of the tenant, sorted by id.
    async fn skills(&self, tenant_id: TenantId) -> Result<Vec<SkillSummary>, SourceError>;
}

/// Progression / validation subsystem (read-only).
#[async_trait]
pub trait ProgressionReader: Send + Sync {
    /// Completion state of `subject` for each of `skills`.
    ///
    /// Skills absent from the returned map are treated as not satisfied.
    async fn completion(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skills: &[SkillId],
    ) -> Result<HashMap<SkillId, CompletionState>, SourceError>;
}

/// Directory of tenants and their learners / active groups.
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    async fn tenants(&self) -> Result<Vec<TenantId>, SourceError>;

    /// Learners and active groups of the tenant, sorted.
    async fn subjects(&self, tenant_id: TenantId) -> Result<Vec<Subject>, SourceError>;

    /// Whether `subject` exists in the tenant (inactive groups included).
    async fn contains(&self, tenant_id: TenantId, subject: Subject) -> Result<bool, SourceError>;
}

#[async_trait]
impl<S> SkillCatalog for Arc<S>
where
    S: SkillCatalog + ?Sized,
{
    async fn skill(&self, tenant_id: TenantId, skill_id: SkillId) -> Result<Option<SkillSummary>, SourceError> {
        (**self).skill(tenant_id, skill_id).await
    }

    async fn skills(&self, tenant_id: TenantId) -> Result<Vec<SkillSummary>, SourceError> {
        (**self).skills(tenant_id).await
    }
}

#[async_trait]
impl<S> ProgressionReader for Arc<S>
where
    S: ProgressionReader + ?Sized,
{
    async fn completion(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skills: &[SkillId],
    ) -> Result<HashMap<SkillId, CompletionState>, SourceError> {
        (**self).completion(tenant_id, subject, skills).await
    }
}

#[async_trait]
impl<S> SubjectDirectory for Arc<S>
where
    S: SubjectDirectory + ?Sized,
{
    async fn tenants(&self) -> Result<Vec<TenantId>, SourceError> {
        (**self).tenants().await
    }

    async fn subjects(&self, tenant_id: TenantId) -> Result<Vec<Subject>, SourceError> {
        (**self).subjects(tenant_id).await
    }

    async fn contains(&self, tenant_id: TenantId, subject: Subject) -> Result<bool, SourceError> {
        (**self).contains(tenant_id, subject).await
    }
}

/// The three collaborators, shared behind `Arc<dyn _>`.
#[derive(Clone)]
pub struct Sources {
    pub catalog: Arc<dyn SkillCatalog>,
    pub progression: Arc<dyn ProgressionReader>,
    pub directory: Arc<dyn SubjectDirectory>,
}

impl Sources {
    pub fn new(
        catalog: Arc<dyn SkillCatalog>,
        progression: Arc<dyn ProgressionReader>,
        directory: Arc<dyn SubjectDirectory>,
    ) -> Self {
        Self {
            catalog,
            progression,
            directory,
        }
    }

    /// Name lookup for a tenant's catalog, used to render edges and cycle errors.
    pub async fn skill_names(&self, tenant_id: TenantId) -> Result<HashMap<SkillId, String>, SourceError> {
        Ok(self
            .catalog
            .skills(tenant_id)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect())
    }
}

impl core::fmt::Debug for Sources {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
