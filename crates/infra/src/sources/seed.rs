//! JSON seed for the in-memory collaborators (local dev and tests).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use figura_core::{GroupId, LearnerId, SkillId, Subject, TenantId};
use figura_graph::PrerequisiteEdge;
use figura_suggestions::CompletionState;

use super::{InMemoryProgression, InMemorySkillCatalog, InMemorySubjectDirectory, SkillSummary};
use crate::error::EdgeWriteError;
use crate::graph_store::PrerequisiteStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub tenants: Vec<TenantSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSeed {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub skills: Vec<SkillSummary>,
    #[serde(default)]
    pub learners: Vec<LearnerId>,
    #[serde(default)]
    pub groups: Vec<GroupSeed>,
    #[serde(default)]
    pub progress: Vec<ProgressSeed>,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSeed {
    pub id: GroupId,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSeed {
    pub subject: Subject,
    pub skill_id: SkillId,
    pub state: CompletionState,
}

impl SeedData {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("invalid seed document")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Populate the read-only collaborators.
    pub fn apply_sources(
        &self,
        catalog: &InMemorySkillCatalog,
        progression: &InMemoryProgression,
        directory: &InMemorySubjectDirectory,
    ) {
        for tenant in &self.tenants {
            directory.add_tenant(tenant.tenant_id);
            for skill in &tenant.skills {
                catalog.insert(tenant.tenant_id, skill.clone());
            }
            for learner in &tenant.learners {
                directory.add_learner(tenant.tenant_id, *learner);
            }
            for group in &tenant.groups {
                directory.add_group(tenant.tenant_id, group.id, group.active);
            }
            for p in &tenant.progress {
                progression.set(tenant.tenant_id, p.subject, p.skill_id, p.state);
            }
        }
    }

    /// Insert seeded edges through the checked write path.
    ///
    /// Edges already present are skipped so a seed can be re-applied.
    pub async fn apply_prerequisites(&self, store: &dyn PrerequisiteStore) -> Result<usize, EdgeWriteError> {
        let mut inserted = 0;
        for tenant in &self.tenants {
            for edge in &tenant.prerequisites {
                match store.insert_checked(tenant.tenant_id, *edge).await {
                    Ok(()) => inserted += 1,
                    Err(EdgeWriteError::Graph(figura_graph::GraphError::DuplicateEdge { .. })) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(inserted)
    }
}
