//! Suggestions for a learning group, managed by instructors.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Router,
};

use figura_auth::Permission;
use figura_core::{GroupId, Subject};
use figura_suggestions::Decision;

use super::suggestions::{decide_for, detail_for, list_for};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/:group/suggestions", get(list))
        .route("/:group/suggestions/:skill", get(detail))
        .route("/:group/suggestions/:skill/accept", post(accept))
        .route("/:group/suggestions/:skill/dismiss", post(dismiss))
        .route("/:group/suggestions/:skill/restore", post(restore))
}

fn group_subject(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    raw: &str,
) -> Result<Subject, axum::response::Response> {
    authz::require(tenant, principal, Permission::GROUP_SUGGESTIONS)?;
    let group: GroupId = errors::parse_id(raw, "group")?;
    Ok(Subject::Group(group))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(group): Path<String>,
) -> axum::response::Response {
    match group_subject(&tenant, &principal, &group) {
        Ok(subject) => list_for(&services, &tenant, subject).await,
        Err(res) => res,
    }
}

pub async fn detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((group, skill)): Path<(String, String)>,
) -> axum::response::Response {
    match group_subject(&tenant, &principal, &group) {
        Ok(subject) => detail_for(&services, &tenant, subject, &skill).await,
        Err(res) => res,
    }
}

async fn decide(
    services: Arc<AppServices>,
    tenant: TenantContext,
    principal: PrincipalContext,
    (group, skill): (String, String),
    decision: Decision,
) -> axum::response::Response {
    match group_subject(&tenant, &principal, &group) {
        Ok(subject) => decide_for(&services, &tenant, subject, &skill, decision).await,
        Err(res) => res,
    }
}

pub async fn accept(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(ids): Path<(String, String)>,
) -> axum::response::Response {
    decide(services, tenant, principal, ids, Decision::Accept).await
}

pub async fn dismiss(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(ids): Path<(String, String)>,
) -> axum::response::Response {
    decide(services, tenant, principal, ids, Decision::Dismiss).await
}

pub async fn restore(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(ids): Path<(String, String)>,
) -> axum::response::Response {
    decide(services, tenant, principal, ids, Decision::Reset).await
}
