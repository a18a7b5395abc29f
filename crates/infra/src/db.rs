//! Postgres wiring: pool, schema, error mapping.
//!
//! ## Error Mapping
//!
//! | SQLx Error | Code | StoreError |
//! |------------|------|------------|
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` (retried by the refresh loop) |
//! | ColumnDecode / Decode / ColumnNotFound | N/A | `Corrupt` |
//! | Database / other | any | `Backend` |
//!
//! Unique violations (`23505`) on edge inserts are mapped to
//! `GraphError::DuplicateEdge` by the graph store itself.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::instrument;

use figura_core::TenantId;

use crate::error::StoreError;

pub(crate) const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS prerequisite_edges (
    tenant_id             UUID        NOT NULL,
    parent_skill_id       UUID        NOT NULL,
    prerequisite_skill_id UUID        NOT NULL,
    sort_order            INTEGER     NOT NULL CHECK (sort_order > 0),
    required              BOOLEAN     NOT NULL,
    weight                SMALLINT    NOT NULL CHECK (weight BETWEEN 0 AND 3),
    created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, parent_skill_id, prerequisite_skill_id),
    CHECK (parent_skill_id <> prerequisite_skill_id)
);

CREATE INDEX IF NOT EXISTS prerequisite_edges_by_prerequisite
    ON prerequisite_edges (tenant_id, prerequisite_skill_id);

CREATE TABLE IF NOT EXISTS suggestion_cache (
    tenant_id        UUID        NOT NULL,
    subject_kind     TEXT        NOT NULL CHECK (subject_kind IN ('learner', 'group')),
    subject_id       UUID        NOT NULL,
    skill_id         UUID        NOT NULL,
    score_hundredths INTEGER     NOT NULL CHECK (score_hundredths BETWEEN 0 AND 10000),
    satisfied_count  INTEGER     NOT NULL,
    required_total   INTEGER     NOT NULL,
    status           TEXT        NOT NULL CHECK (status IN ('pending', 'accepted', 'dismissed')),
    created_at       TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL,
    expires_at       TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (tenant_id, subject_kind, subject_id, skill_id),
    CHECK (satisfied_count <= required_total)
);

CREATE INDEX IF NOT EXISTS suggestion_cache_pending
    ON suggestion_cache (tenant_id, subject_kind, subject_id, score_hundredths DESC)
    WHERE status = 'pending';
"#;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the tables owned by this engine if they do not exist.
#[instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

pub(crate) fn map_sqlx_error(operation: &'static str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {e}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{operation}: {e}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Advisory lock key for a tenant's prerequisite graph.
///
/// Folds the tenant UUID into an `i64`; collisions only over-serialize.
pub(crate) fn tenant_lock_key(tenant_id: TenantId) -> i64 {
    let (hi, lo) = tenant_id.as_uuid().as_u64_pair();
    (hi ^ lo) as i64
}
