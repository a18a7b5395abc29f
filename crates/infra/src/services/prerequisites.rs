use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use figura_core::{SkillId, TenantId};
use figura_graph::{CycleReport, EdgeAttributes, EdgeKey, GraphError, PrerequisiteEdge};

use crate::error::{EdgeWriteError, SourceError, StoreError};
use crate::graph_store::PrerequisiteStore;
use crate::sources::SkillCatalog;

/// A skill id with its catalog name, for messages and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillRef {
    pub id: SkillId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SkillRef {
    fn resolve(id: SkillId, names: &HashMap<SkillId, String>) -> Self {
        Self {
            id,
            name: names.get(&id).cloned(),
        }
    }
}

impl core::fmt::Display for SkillRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{name}\" ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A rejected insertion, with names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCycle {
    pub parent: SkillRef,
    pub prerequisite: SkillRef,
    /// Already requires `parent` through `prerequisite`.
    pub conflicting: SkillRef,
    pub path: Vec<SkillRef>,
}

impl NamedCycle {
    fn resolve(report: &CycleReport, names: &HashMap<SkillId, String>) -> Self {
        Self {
            parent: SkillRef::resolve(report.parent, names),
            prerequisite: SkillRef::resolve(report.prerequisite, names),
            conflicting: SkillRef::resolve(report.conflicting, names),
            path: report.path.iter().map(|id| SkillRef::resolve(*id, names)).collect(),
        }
    }
}

impl core::fmt::Display for NamedCycle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.parent.id == self.prerequisite.id {
            return write!(f, "skill {} cannot be its own prerequisite", self.parent);
        }
        write!(
            f,
            "adding {} as a prerequisite of {} would create a cycle: {} already requires {}",
            self.prerequisite, self.parent, self.conflicting, self.parent
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrerequisiteError {
    #[error("{0}")]
    CycleDetected(NamedCycle),

    #[error("{prerequisite} is already a prerequisite of {parent}")]
    DuplicateEdge { parent: SkillRef, prerequisite: SkillRef },

    #[error("skill {0} not found")]
    SkillNotFound(SkillId),

    #[error("prerequisite edge {parent} -> {prerequisite} not found")]
    EdgeNotFound { parent: SkillId, prerequisite: SkillId },

    #[error("invalid prerequisite edge: {0}")]
    InvalidEdge(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Edge plus resolved names, as listed by the admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub parent: SkillRef,
    pub prerequisite: SkillRef,
    pub order: u32,
    pub required: bool,
    pub weight: u8,
}

impl EdgeView {
    fn new(edge: &PrerequisiteEdge, names: &HashMap<SkillId, String>) -> Self {
        Self {
            parent: SkillRef::resolve(edge.parent, names),
            prerequisite: SkillRef::resolve(edge.prerequisite, names),
            order: edge.order,
            required: edge.required,
            weight: edge.weight,
        }
    }
}

/// Administrative mutations and queries on the prerequisite graph.
#[derive(Clone)]
pub struct PrerequisiteService {
    store: Arc<dyn PrerequisiteStore>,
    catalog: Arc<dyn SkillCatalog>,
}

impl core::fmt::Debug for PrerequisiteService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrerequisiteService").finish_non_exhaustive()
    }
}

impl PrerequisiteService {
    pub fn new(store: Arc<dyn PrerequisiteStore>, catalog: Arc<dyn SkillCatalog>) -> Self {
        Self { store, catalog }
    }

    async fn names(&self, tenant_id: TenantId) -> Result<HashMap<SkillId, String>, SourceError> {
        Ok(self
            .catalog
            .skills(tenant_id)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect())
    }

    async fn require_skill(&self, tenant_id: TenantId, skill_id: SkillId) -> Result<(), PrerequisiteError> {
        match self.catalog.skill(tenant_id, skill_id).await? {
            Some(_) => Ok(()),
            None => Err(PrerequisiteError::SkillNotFound(skill_id)),
        }
    }

    /// Insert `parent -> prerequisite` after the cycle guard.
    #[instrument(skip(self, attrs), fields(tenant = %tenant_id, parent = %parent, prerequisite = %prerequisite))]
    pub async fn add_edge(
        &self,
        tenant_id: TenantId,
        parent: SkillId,
        prerequisite: SkillId,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, PrerequisiteError> {
        attrs
            .validate()
            .map_err(|e| self.graph_error(e, &HashMap::new()))?;
        self.require_skill(tenant_id, parent).await?;
        self.require_skill(tenant_id, prerequisite).await?;

        let edge = PrerequisiteEdge::new(EdgeKey::new(parent, prerequisite), attrs);
        match self.store.insert_checked(tenant_id, edge).await {
            Ok(()) => {
                info!(order = attrs.order, required = attrs.required, weight = attrs.weight, "prerequisite added");
                Ok(edge)
            }
            Err(EdgeWriteError::Graph(e)) => {
                let names = self.names(tenant_id).await.unwrap_or_default();
                let err = self.graph_error(e, &names);
                warn!(error = %err, "prerequisite rejected");
                Err(err)
            }
            Err(EdgeWriteError::Store(e)) => Err(e.into()),
        }
    }

    #[instrument(skip(self, attrs), fields(tenant = %tenant_id, parent = %key.parent, prerequisite = %key.prerequisite))]
    pub async fn update_edge(
        &self,
        tenant_id: TenantId,
        key: EdgeKey,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, PrerequisiteError> {
        let edge = self
            .store
            .update_edge(tenant_id, key, attrs)
            .await
            .map_err(|e| self.write_error(e))?;
        info!(order = edge.order, required = edge.required, weight = edge.weight, "prerequisite updated");
        Ok(edge)
    }

    /// Deletion is unconditional: removing an edge can never create a cycle.
    #[instrument(skip(self), fields(tenant = %tenant_id, parent = %key.parent, prerequisite = %key.prerequisite))]
    pub async fn remove_edge(&self, tenant_id: TenantId, key: EdgeKey) -> Result<PrerequisiteEdge, PrerequisiteError> {
        let edge = self
            .store
            .remove_edge(tenant_id, key)
            .await
            .map_err(|e| self.write_error(e))?;
        info!("prerequisite removed");
        Ok(edge)
    }

    /// Prerequisites of `parent`, in edge order.
    pub async fn edges_for(&self, tenant_id: TenantId, parent: SkillId) -> Result<Vec<EdgeView>, PrerequisiteError> {
        self.require_skill(tenant_id, parent).await?;
        let edges = self.store.edges_for(tenant_id, parent).await?;
        let names = self.names(tenant_id).await?;
        Ok(edges.iter().map(|e| EdgeView::new(e, &names)).collect())
    }

    /// Skills that require `prerequisite`.
    pub async fn dependents(
        &self,
        tenant_id: TenantId,
        prerequisite: SkillId,
    ) -> Result<Vec<EdgeView>, PrerequisiteError> {
        self.require_skill(tenant_id, prerequisite).await?;
        let edges = self.store.reverse_edges_for(tenant_id, prerequisite).await?;
        let names = self.names(tenant_id).await?;
        Ok(edges.iter().map(|e| EdgeView::new(e, &names)).collect())
    }

    fn write_error(&self, e: EdgeWriteError) -> PrerequisiteError {
        match e {
            EdgeWriteError::Graph(g) => self.graph_error(g, &HashMap::new()),
            EdgeWriteError::Store(s) => PrerequisiteError::Store(s),
        }
    }

    fn graph_error(&self, e: GraphError, names: &HashMap<SkillId, String>) -> PrerequisiteError {
        match e {
            GraphError::CycleDetected(report) => PrerequisiteError::CycleDetected(NamedCycle::resolve(&report, names)),
            GraphError::DuplicateEdge { parent, prerequisite } => PrerequisiteError::DuplicateEdge {
                parent: SkillRef::resolve(parent, names),
                prerequisite: SkillRef::resolve(prerequisite, names),
            },
            GraphError::EdgeNotFound { parent, prerequisite } => {
                PrerequisiteError::EdgeNotFound { parent, prerequisite }
            }
            GraphError::InvalidEdge(msg) => PrerequisiteError::InvalidEdge(msg),
        }
    }
}
