//! Postgres-backed suggestion cache.
//!
//! Refresh upserts only touch rows still `pending` (`ON CONFLICT ... WHERE`),
//! and decisions lock the row (`FOR UPDATE`) before applying the lifecycle
//! rules, so a refresh can never clobber a decision and two decisions on the
//! same key serialize. Plan additions bypass the lifecycle with a single
//! conditional upsert.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use figura_core::{SkillId, Subject, TenantId};
use figura_suggestions::{
    Decision, DecisionOutcome, Readiness, RefreshOutcome, Score, SuggestionEntry, SuggestionStatus,
};

use super::SuggestionCache;
use crate::db::map_sqlx_error;
use crate::error::{DecisionError, StoreError};

const ENTRY_COLUMNS: &str = "tenant_id, subject_kind, subject_id, skill_id, score_hundredths, \
     satisfied_count, required_total, status, created_at, updated_at, expires_at";

#[derive(Debug, Clone)]
pub struct PostgresSuggestionCache {
    pool: PgPool,
}

impl PostgresSuggestionCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> Result<SuggestionEntry, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_suggestion", e);
    let tenant_id: Uuid = row.try_get("tenant_id").map_err(decode)?;
    let subject_kind: String = row.try_get("subject_kind").map_err(decode)?;
    let subject_id: Uuid = row.try_get("subject_id").map_err(decode)?;
    let skill_id: Uuid = row.try_get("skill_id").map_err(decode)?;
    let score: i32 = row.try_get("score_hundredths").map_err(decode)?;
    let satisfied_count: i32 = row.try_get("satisfied_count").map_err(decode)?;
    let required_total: i32 = row.try_get("required_total").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;

    let subject =
        Subject::from_parts(&subject_kind, subject_id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let score = u16::try_from(score)
        .ok()
        .and_then(Score::from_hundredths)
        .ok_or_else(|| StoreError::Corrupt(format!("score_hundredths {score}")))?;
    let status = SuggestionStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{status}'")))?;
    let count = |v: i32| u32::try_from(v).map_err(|_| StoreError::Corrupt(format!("negative count {v}")));

    Ok(SuggestionEntry {
        tenant_id: TenantId::from_uuid(tenant_id),
        subject,
        skill_id: SkillId::from_uuid(skill_id),
        score,
        satisfied_count: count(satisfied_count)?,
        required_total: count(required_total)?,
        status,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
    })
}

#[async_trait]
impl SuggestionCache for PostgresSuggestionCache {
    #[instrument(skip(self, readiness), fields(tenant_id = %tenant_id, subject = %subject, skill_id = %skill_id), err)]
    async fn upsert_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<RefreshOutcome, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO suggestion_cache
                (tenant_id, subject_kind, subject_id, skill_id, score_hundredths,
                 satisfied_count, required_total, status, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8, $9)
            ON CONFLICT (tenant_id, subject_kind, subject_id, skill_id) DO UPDATE
            SET score_hundredths = EXCLUDED.score_hundredths,
                satisfied_count  = EXCLUDED.satisfied_count,
                required_total   = EXCLUDED.required_total,
                updated_at       = EXCLUDED.updated_at,
                expires_at       = EXCLUDED.expires_at
            WHERE suggestion_cache.status = 'pending'
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(skill_id.as_uuid())
        .bind(i32::from(readiness.score.hundredths()))
        .bind(readiness.satisfied_count as i32)
        .bind(readiness.required_total as i32)
        .bind(now)
        .bind(now + ttl)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_pending", e))?;

        if let Some(row) = row {
            let inserted: bool = row
                .try_get("inserted")
                .map_err(|e| map_sqlx_error("upsert_pending", e))?;
            return Ok(if inserted {
                RefreshOutcome::Created
            } else {
                RefreshOutcome::Refreshed
            });
        }

        // Conflict row was decided; report which decision kept it.
        let current = self.get(tenant_id, subject, skill_id).await?;
        match current {
            Some(entry) => Ok(RefreshOutcome::Skipped(entry.status)),
            None => Err(StoreError::Backend("upsert_pending: row vanished".to_string())),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, subject = %subject, skill_id = %skill_id), err)]
    async fn decide(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM suggestion_cache
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3 AND skill_id = $4
            FOR UPDATE
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(skill_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("decide_load", e))?;

        let Some(row) = row else {
            return Ok(DecisionOutcome::NoLongerAvailable);
        };
        let mut entry = entry_from_row(&row)?;
        let outcome = entry.decide(decision, now)?;

        if outcome == DecisionOutcome::Applied {
            sqlx::query(
                r#"
                UPDATE suggestion_cache SET status = $5, updated_at = $6
                WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3 AND skill_id = $4
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(subject.kind())
            .bind(subject.uuid())
            .bind(skill_id.as_uuid())
            .bind(entry.status.as_str())
            .bind(entry.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("decide_update", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(outcome)
    }

    /// Insert accepted, or flip an existing row to accepted whatever its
    /// status or expiry. No returned row means it was already accepted.
    #[instrument(skip(self, readiness), fields(tenant_id = %tenant_id, subject = %subject, skill_id = %skill_id), err)]
    async fn record_planned(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
        readiness: Readiness,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO suggestion_cache
                (tenant_id, subject_kind, subject_id, skill_id, score_hundredths,
                 satisfied_count, required_total, status, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'accepted', $8, $8, $8)
            ON CONFLICT (tenant_id, subject_kind, subject_id, skill_id) DO UPDATE
            SET status     = 'accepted',
                updated_at = EXCLUDED.updated_at
            WHERE suggestion_cache.status <> 'accepted'
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(skill_id.as_uuid())
        .bind(i32::from(readiness.score.hundredths()))
        .bind(readiness.satisfied_count as i32)
        .bind(readiness.required_total as i32)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_planned", e))?;

        Ok(match row {
            Some(_) => DecisionOutcome::Applied,
            None => DecisionOutcome::Unchanged,
        })
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skill_id: SkillId,
    ) -> Result<Option<SuggestionEntry>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM suggestion_cache
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3 AND skill_id = $4
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(skill_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_suggestion", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_pending(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        now: DateTime<Utc>,
    ) -> Result<Vec<SuggestionEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM suggestion_cache
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3
              AND status = 'pending' AND expires_at > $4
            ORDER BY score_hundredths DESC, skill_id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_pending", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn entries_for(&self, tenant_id: TenantId, subject: Subject) -> Result<Vec<SuggestionEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM suggestion_cache
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3
            ORDER BY skill_id ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_for", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self, keep), fields(tenant_id = %tenant_id, subject = %subject, keep = keep.len()), err)]
    async fn retain_candidates(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        keep: &[SkillId],
    ) -> Result<u64, StoreError> {
        let keep: Vec<Uuid> = keep.iter().map(|s| *s.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            DELETE FROM suggestion_cache
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3
              AND status = 'pending' AND NOT (skill_id = ANY($4))
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(&keep)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("retain_candidates", e))?;

        Ok(result.rows_affected())
    }
}
