//! Prerequisite Graph Store: persistence of a tenant's edges.
//!
//! Inserts are *checked*: the cycle guard and the write happen under one
//! per-tenant critical section, so two concurrent inserts can never each
//! pass the guard and together close a cycle.

use std::sync::Arc;

use async_trait::async_trait;

use figura_core::{SkillId, TenantId};
use figura_graph::{EdgeAttributes, EdgeKey, PrerequisiteEdge, PrerequisiteGraph};

use crate::error::{EdgeWriteError, StoreError};

pub mod in_memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryPrerequisiteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresPrerequisiteStore;

#[async_trait]
pub trait PrerequisiteStore: Send + Sync {
    /// Validate, run the cycle guard, and insert, atomically per tenant.
    async fn insert_checked(&self, tenant_id: TenantId, edge: PrerequisiteEdge) -> Result<(), EdgeWriteError>;

    /// Change order/required/weight of an existing edge. Structure is untouched.
    async fn update_edge(
        &self,
        tenant_id: TenantId,
        key: EdgeKey,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, EdgeWriteError>;

    /// Remove an edge, returning it.
    async fn remove_edge(&self, tenant_id: TenantId, key: EdgeKey) -> Result<PrerequisiteEdge, EdgeWriteError>;

    /// Edges where `parent` is the dependent skill, by `(order, prerequisite)`.
    async fn edges_for(&self, tenant_id: TenantId, parent: SkillId) -> Result<Vec<PrerequisiteEdge>, StoreError>;

    /// Edges where `prerequisite` is required by another skill, by parent.
    async fn reverse_edges_for(
        &self,
        tenant_id: TenantId,
        prerequisite: SkillId,
    ) -> Result<Vec<PrerequisiteEdge>, StoreError>;

    /// The tenant's whole edge set, loaded once for batch traversal.
    async fn snapshot(&self, tenant_id: TenantId) -> Result<PrerequisiteGraph, StoreError>;
}

#[async_trait]
impl<S> PrerequisiteStore for Arc<S>
where
    S: PrerequisiteStore + ?Sized,
{
    async fn insert_checked(&self, tenant_id: TenantId, edge: PrerequisiteEdge) -> Result<(), EdgeWriteError> {
        (**self).insert_checked(tenant_id, edge).await
    }

    async fn update_edge(
        &self,
        tenant_id: TenantId,
        key: EdgeKey,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, EdgeWriteError> {
        (**self).update_edge(tenant_id, key, attrs).await
    }

    async fn remove_edge(&self, tenant_id: TenantId, key: EdgeKey) -> Result<PrerequisiteEdge, EdgeWriteError> {
        (**self).remove_edge(tenant_id, key).await
    }

    async fn edges_for(&self, tenant_id: TenantId, parent: SkillId) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        (**self).edges_for(tenant_id, parent).await
    }

    async fn reverse_edges_for(
        &self,
        tenant_id: TenantId,
        prerequisite: SkillId,
    ) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        (**self).reverse_edges_for(tenant_id, prerequisite).await
    }

    async fn snapshot(&self, tenant_id: TenantId) -> Result<PrerequisiteGraph, StoreError> {
        (**self).snapshot(tenant_id).await
    }
}
