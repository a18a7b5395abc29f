use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use figura_core::{SkillId, TenantId};
use figura_graph::{check_insert, EdgeAttributes, EdgeKey, GraphError, PrerequisiteEdge, PrerequisiteGraph};

use super::PrerequisiteStore;
use crate::error::{EdgeWriteError, StoreError};

type TenantEdges = BTreeMap<EdgeKey, PrerequisiteEdge>;

/// In-memory prerequisite store for tests/dev.
///
/// The write lock is the per-tenant critical section (coarser: it spans
/// all tenants).
#[derive(Debug, Default)]
pub struct InMemoryPrerequisiteStore {
    inner: RwLock<HashMap<TenantId, TenantEdges>>,
}

impl InMemoryPrerequisiteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("prerequisite store lock poisoned".to_string())
}

fn not_found(key: EdgeKey) -> EdgeWriteError {
    EdgeWriteError::Graph(GraphError::EdgeNotFound {
        parent: key.parent,
        prerequisite: key.prerequisite,
    })
}

#[async_trait]
impl PrerequisiteStore for InMemoryPrerequisiteStore {
    async fn insert_checked(&self, tenant_id: TenantId, edge: PrerequisiteEdge) -> Result<(), EdgeWriteError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let edges = map.entry(tenant_id).or_default();

        let graph = PrerequisiteGraph::from_edges(edges.values().copied());
        check_insert(&graph, &edge)?;

        edges.insert(edge.key(), edge);
        Ok(())
    }

    async fn update_edge(
        &self,
        tenant_id: TenantId,
        key: EdgeKey,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, EdgeWriteError> {
        attrs.validate()?;
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let edge = map
            .get_mut(&tenant_id)
            .and_then(|edges| edges.get_mut(&key))
            .ok_or_else(|| not_found(key))?;
        *edge = edge.with_attributes(attrs);
        Ok(*edge)
    }

    async fn remove_edge(&self, tenant_id: TenantId, key: EdgeKey) -> Result<PrerequisiteEdge, EdgeWriteError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.get_mut(&tenant_id)
            .and_then(|edges| edges.remove(&key))
            .ok_or_else(|| not_found(key))
    }

    async fn edges_for(&self, tenant_id: TenantId, parent: SkillId) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut out: Vec<PrerequisiteEdge> = map
            .get(&tenant_id)
            .map(|edges| edges.values().filter(|e| e.parent == parent).copied().collect())
            .unwrap_or_default();
        out.sort_by_key(|e| (e.order, e.prerequisite));
        Ok(out)
    }

    async fn reverse_edges_for(
        &self,
        tenant_id: TenantId,
        prerequisite: SkillId,
    ) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        // BTreeMap iteration is by (parent, prerequisite), already parent-sorted.
        Ok(map
            .get(&tenant_id)
            .map(|edges| {
                edges
                    .values()
                    .filter(|e| e.prerequisite == prerequisite)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn snapshot(&self, tenant_id: TenantId) -> Result<PrerequisiteGraph, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&tenant_id)
            .map(|edges| PrerequisiteGraph::from_edges(edges.values().copied()))
            .unwrap_or_default())
    }
}
