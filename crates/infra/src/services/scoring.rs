use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use figura_core::{SkillId, Subject, TenantId};
use figura_graph::PrerequisiteGraph;
use figura_suggestions::{
    CompletionState, NotApplicable, PreparationScoreCalculator, PrerequisiteProgress, Readiness,
};

use crate::error::{SourceError, StoreError};
use crate::graph_store::PrerequisiteStore;
use crate::sources::ProgressionReader;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error(transparent)]
    NotApplicable(#[from] NotApplicable),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Single-candidate scoring against live edges and completion state.
///
/// Batch refresh does not go through here; it scores against one snapshot
/// per tenant.
#[derive(Clone)]
pub struct ScoreCalculator {
    store: Arc<dyn PrerequisiteStore>,
    progression: Arc<dyn ProgressionReader>,
}

impl core::fmt::Debug for ScoreCalculator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScoreCalculator").finish_non_exhaustive()
    }
}

impl ScoreCalculator {
    pub fn new(store: Arc<dyn PrerequisiteStore>, progression: Arc<dyn ProgressionReader>) -> Self {
        Self { store, progression }
    }

    /// Loads the candidate's edges and the subject's completion for them.
    async fn load(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        candidate: SkillId,
    ) -> Result<(PrerequisiteGraph, HashMap<SkillId, CompletionState>), ScoreError> {
        let edges = self.store.edges_for(tenant_id, candidate).await?;
        let prerequisites: Vec<SkillId> = edges.iter().map(|e| e.prerequisite).collect();
        let completion = self.progression.completion(tenant_id, subject, &prerequisites).await?;
        Ok((PrerequisiteGraph::from_edges(edges), completion))
    }

    pub async fn compute_score(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        candidate: SkillId,
    ) -> Result<Readiness, ScoreError> {
        let (graph, completion) = self.load(tenant_id, subject, candidate).await?;
        Ok(PreparationScoreCalculator::new(&graph, &completion).compute_score(candidate)?)
    }

    /// Every prerequisite of `candidate` with the subject's state, in edge order.
    pub async fn breakdown(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        candidate: SkillId,
    ) -> Result<Vec<PrerequisiteProgress>, ScoreError> {
        let (graph, completion) = self.load(tenant_id, subject, candidate).await?;
        Ok(PreparationScoreCalculator::new(&graph, &completion).breakdown(candidate))
    }
}
