//! The authenticated learner's own suggestions.
//!
//! The handlers here are subject-agnostic underneath; `groups.rs` reuses them
//! with a group subject.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use figura_auth::Permission;
use figura_core::{SkillId, Subject};
use figura_suggestions::Decision;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:skill", get(detail))
        .route("/:skill/accept", post(accept))
        .route("/:skill/dismiss", post(dismiss))
        .route("/:skill/restore", post(restore))
}

pub(crate) async fn list_for(
    services: &AppServices,
    tenant: &TenantContext,
    subject: Subject,
) -> axum::response::Response {
    let suggestions = &services.suggestions;
    if let Err(e) = suggestions.ensure_subject(tenant.tenant_id(), subject).await {
        return errors::suggestion_error_to_response(e);
    }
    match suggestions.list_pending(tenant.tenant_id(), subject, Utc::now()).await {
        Ok(views) => Json(views).into_response(),
        Err(e) => errors::suggestion_error_to_response(e),
    }
}

pub(crate) async fn detail_for(
    services: &AppServices,
    tenant: &TenantContext,
    subject: Subject,
    skill: &str,
) -> axum::response::Response {
    let skill: SkillId = match errors::parse_id(skill, "skill") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let suggestions = &services.suggestions;
    if let Err(e) = suggestions.ensure_subject(tenant.tenant_id(), subject).await {
        return errors::suggestion_error_to_response(e);
    }
    match suggestions.detail(tenant.tenant_id(), subject, skill, Utc::now()).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => errors::suggestion_error_to_response(e),
    }
}

pub(crate) async fn decide_for(
    services: &AppServices,
    tenant: &TenantContext,
    subject: Subject,
    skill: &str,
    decision: Decision,
) -> axum::response::Response {
    let skill: SkillId = match errors::parse_id(skill, "skill") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let suggestions = &services.suggestions;
    if let Err(e) = suggestions.ensure_subject(tenant.tenant_id(), subject).await {
        return errors::suggestion_error_to_response(e);
    }
    match suggestions
        .decide(tenant.tenant_id(), subject, skill, decision, Utc::now())
        .await
    {
        Ok(outcome) => Json(dto::DecisionResponse::from(outcome)).into_response(),
        Err(e) => errors::suggestion_error_to_response(e),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::SUGGESTIONS_READ) {
        return res;
    }
    list_for(&services, &tenant, principal.own_subject()).await
}

pub async fn detail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(skill): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::SUGGESTIONS_READ) {
        return res;
    }
    detail_for(&services, &tenant, principal.own_subject(), &skill).await
}

async fn decide(
    services: Arc<AppServices>,
    tenant: TenantContext,
    principal: PrincipalContext,
    skill: String,
    decision: Decision,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::SUGGESTIONS_DECIDE) {
        return res;
    }
    decide_for(&services, &tenant, principal.own_subject(), &skill, decision).await
}

pub async fn accept(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(skill): Path<String>,
) -> axum::response::Response {
    decide(services, tenant, principal, skill, Decision::Accept).await
}

pub async fn dismiss(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(skill): Path<String>,
) -> axum::response::Response {
    decide(services, tenant, principal, skill, Decision::Dismiss).await
}

pub async fn restore(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(skill): Path<String>,
) -> axum::response::Response {
    decide(services, tenant, principal, skill, Decision::Reset).await
}
