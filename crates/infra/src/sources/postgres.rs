//! Postgres adapters over tables owned by the catalog, progression and
//! membership subsystems. Read-only: this engine never writes them.
//!
//! Expected relations:
//!
//! - `skills (tenant_id, id, name, discipline, archived)`
//! - `skill_progress (tenant_id, subject_kind, subject_id, skill_id, state)`
//! - `learners (tenant_id, id)`
//! - `learning_groups (tenant_id, id, active)`

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use figura_core::{GroupId, LearnerId, SkillId, Subject, TenantId};
use figura_suggestions::CompletionState;

use super::{ProgressionReader, SkillCatalog, SkillSummary, SubjectDirectory};
use crate::error::SourceError;

fn source_error(source_name: &'static str) -> impl Fn(sqlx::Error) -> SourceError {
    move |e| SourceError::unavailable(source_name, e.to_string())
}

fn skill_from_row(row: &PgRow) -> Result<SkillSummary, SourceError> {
    let err = source_error("skill catalog");
    let id: Uuid = row.try_get("id").map_err(&err)?;
    Ok(SkillSummary {
        id: SkillId::from_uuid(id),
        name: row.try_get("name").map_err(&err)?,
        discipline: row.try_get("discipline").map_err(&err)?,
    })
}

#[derive(Debug, Clone)]
pub struct PgSkillCatalog {
    pool: PgPool,
}

impl PgSkillCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SkillCatalog for PgSkillCatalog {
    async fn skill(&self, tenant_id: TenantId, skill_id: SkillId) -> Result<Option<SkillSummary>, SourceError> {
        let row = sqlx::query(
            "SELECT id, name, discipline FROM skills WHERE tenant_id = $1 AND id = $2 AND NOT archived",
        )
        .bind(tenant_id.as_uuid())
        .bind(skill_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(source_error("skill catalog"))?;

        row.as_ref().map(skill_from_row).transpose()
    }

    async fn skills(&self, tenant_id: TenantId) -> Result<Vec<SkillSummary>, SourceError> {
        let rows = sqlx::query(
            "SELECT id, name, discipline FROM skills WHERE tenant_id = $1 AND NOT archived ORDER BY id",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("skill catalog"))?;

        rows.iter().map(skill_from_row).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PgProgressionReader {
    pool: PgPool,
}

impl PgProgressionReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressionReader for PgProgressionReader {
    async fn completion(
        &self,
        tenant_id: TenantId,
        subject: Subject,
        skills: &[SkillId],
    ) -> Result<HashMap<SkillId, CompletionState>, SourceError> {
        if skills.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = skills.iter().map(|s| *s.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT skill_id, state FROM skill_progress
            WHERE tenant_id = $1 AND subject_kind = $2 AND subject_id = $3 AND skill_id = ANY($4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject.kind())
        .bind(subject.uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("progression"))?;

        let err = source_error("progression");
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let skill: Uuid = row.try_get("skill_id").map_err(&err)?;
            let state: String = row.try_get("state").map_err(&err)?;
            out.insert(SkillId::from_uuid(skill), CompletionState::parse(&state));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct PgSubjectDirectory {
    pool: PgPool,
}

impl PgSubjectDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectDirectory for PgSubjectDirectory {
    async fn tenants(&self) -> Result<Vec<TenantId>, SourceError> {
        let rows = sqlx::query(
            "SELECT tenant_id FROM learners UNION SELECT tenant_id FROM learning_groups ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("subject directory"))?;

        let err = source_error("subject directory");
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("tenant_id").map(TenantId::from_uuid).map_err(&err))
            .collect()
    }

    async fn subjects(&self, tenant_id: TenantId) -> Result<Vec<Subject>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT 'learner' AS kind, id FROM learners WHERE tenant_id = $1
            UNION ALL
            SELECT 'group' AS kind, id FROM learning_groups WHERE tenant_id = $1 AND active
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(source_error("subject directory"))?;

        let err = source_error("subject directory");
        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get("kind").map_err(&err)?;
            let id: Uuid = row.try_get("id").map_err(&err)?;
            subjects.push(match kind.as_str() {
                "group" => Subject::Group(GroupId::from_uuid(id)),
                _ => Subject::Learner(LearnerId::from_uuid(id)),
            });
        }
        subjects.sort();
        Ok(subjects)
    }

    async fn contains(&self, tenant_id: TenantId, subject: Subject) -> Result<bool, SourceError> {
        let sql = match subject {
            Subject::Learner(_) => "SELECT EXISTS (SELECT 1 FROM learners WHERE tenant_id = $1 AND id = $2)",
            Subject::Group(_) => {
                "SELECT EXISTS (SELECT 1 FROM learning_groups WHERE tenant_id = $1 AND id = $2)"
            }
        };
        sqlx::query_scalar::<_, bool>(sql)
            .bind(tenant_id.as_uuid())
            .bind(subject.uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(source_error("subject directory"))
    }
}
