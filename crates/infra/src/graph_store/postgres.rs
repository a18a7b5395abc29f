//! Postgres-backed prerequisite store.
//!
//! `insert_checked` runs inside one transaction holding
//! `pg_advisory_xact_lock(tenant)`: the tenant's edges are loaded, the cycle
//! guard runs on the in-memory arena, and the row is inserted before the lock
//! is released at commit. Every query filters on `tenant_id`.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use figura_core::{SkillId, TenantId};
use figura_graph::{check_insert, EdgeAttributes, EdgeKey, GraphError, PrerequisiteEdge, PrerequisiteGraph};

use super::PrerequisiteStore;
use crate::db::{is_unique_violation, map_sqlx_error, tenant_lock_key};
use crate::error::{EdgeWriteError, StoreError};

const EDGE_COLUMNS: &str = "parent_skill_id, prerequisite_skill_id, sort_order, required, weight";

#[derive(Debug, Clone)]
pub struct PostgresPrerequisiteStore {
    pool: PgPool,
}

impl PostgresPrerequisiteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_all(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
    ) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EDGE_COLUMNS} FROM prerequisite_edges WHERE tenant_id = $1"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_edges", e))?;

        rows.iter().map(edge_from_row).collect()
    }
}

fn edge_from_row(row: &PgRow) -> Result<PrerequisiteEdge, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_edge", e);
    let parent: uuid::Uuid = row.try_get("parent_skill_id").map_err(decode)?;
    let prerequisite: uuid::Uuid = row.try_get("prerequisite_skill_id").map_err(decode)?;
    let order: i32 = row.try_get("sort_order").map_err(decode)?;
    let required: bool = row.try_get("required").map_err(decode)?;
    let weight: i16 = row.try_get("weight").map_err(decode)?;

    let order = u32::try_from(order).map_err(|_| StoreError::Corrupt(format!("sort_order {order}")))?;
    let weight = u8::try_from(weight).map_err(|_| StoreError::Corrupt(format!("weight {weight}")))?;

    Ok(PrerequisiteEdge::new(
        EdgeKey::new(SkillId::from_uuid(parent), SkillId::from_uuid(prerequisite)),
        EdgeAttributes::new(order, required, weight),
    ))
}

fn not_found(key: EdgeKey) -> EdgeWriteError {
    EdgeWriteError::Graph(GraphError::EdgeNotFound {
        parent: key.parent,
        prerequisite: key.prerequisite,
    })
}

#[async_trait]
impl PrerequisiteStore for PostgresPrerequisiteStore {
    #[instrument(
        skip(self, edge),
        fields(
            tenant_id = %tenant_id,
            parent = %edge.parent,
            prerequisite = %edge.prerequisite
        ),
        err
    )]
    async fn insert_checked(&self, tenant_id: TenantId, edge: PrerequisiteEdge) -> Result<(), EdgeWriteError> {
        edge.attributes().validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(tenant_lock_key(tenant_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        let graph = PrerequisiteGraph::from_edges(Self::load_all(&mut tx, tenant_id).await?);
        check_insert(&graph, &edge)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO prerequisite_edges
                (tenant_id, parent_skill_id, prerequisite_skill_id, sort_order, required, weight)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(edge.parent.as_uuid())
        .bind(edge.prerequisite.as_uuid())
        .bind(edge.order as i32)
        .bind(edge.required)
        .bind(i16::from(edge.weight))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(GraphError::DuplicateEdge {
                    parent: edge.parent,
                    prerequisite: edge.prerequisite,
                }
                .into());
            }
            Err(e) => return Err(map_sqlx_error("insert_edge", e).into()),
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn update_edge(
        &self,
        tenant_id: TenantId,
        key: EdgeKey,
        attrs: EdgeAttributes,
    ) -> Result<PrerequisiteEdge, EdgeWriteError> {
        attrs.validate()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE prerequisite_edges
            SET sort_order = $4, required = $5, weight = $6
            WHERE tenant_id = $1 AND parent_skill_id = $2 AND prerequisite_skill_id = $3
            RETURNING {EDGE_COLUMNS}
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(key.parent.as_uuid())
        .bind(key.prerequisite.as_uuid())
        .bind(attrs.order as i32)
        .bind(attrs.required)
        .bind(i16::from(attrs.weight))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_edge", e))?;

        match row {
            Some(row) => Ok(edge_from_row(&row)?),
            None => Err(not_found(key)),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn remove_edge(&self, tenant_id: TenantId, key: EdgeKey) -> Result<PrerequisiteEdge, EdgeWriteError> {
        let row = sqlx::query(&format!(
            r#"
            DELETE FROM prerequisite_edges
            WHERE tenant_id = $1 AND parent_skill_id = $2 AND prerequisite_skill_id = $3
            RETURNING {EDGE_COLUMNS}
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(key.parent.as_uuid())
        .bind(key.prerequisite.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_edge", e))?;

        match row {
            Some(row) => Ok(edge_from_row(&row)?),
            None => Err(not_found(key)),
        }
    }

    async fn edges_for(&self, tenant_id: TenantId, parent: SkillId) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {EDGE_COLUMNS} FROM prerequisite_edges
            WHERE tenant_id = $1 AND parent_skill_id = $2
            ORDER BY sort_order ASC, prerequisite_skill_id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(parent.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("edges_for", e))?;

        rows.iter().map(edge_from_row).collect()
    }

    async fn reverse_edges_for(
        &self,
        tenant_id: TenantId,
        prerequisite: SkillId,
    ) -> Result<Vec<PrerequisiteEdge>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {EDGE_COLUMNS} FROM prerequisite_edges
            WHERE tenant_id = $1 AND prerequisite_skill_id = $2
            ORDER BY parent_skill_id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(prerequisite.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("reverse_edges_for", e))?;

        rows.iter().map(edge_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn snapshot(&self, tenant_id: TenantId) -> Result<PrerequisiteGraph, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EDGE_COLUMNS} FROM prerequisite_edges WHERE tenant_id = $1"
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("snapshot", e))?;

        let edges = rows.iter().map(edge_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(PrerequisiteGraph::from_edges(edges))
    }
}
