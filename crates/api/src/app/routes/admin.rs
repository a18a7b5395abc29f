//! Administrative routes: the prerequisite graph and batch refresh.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use figura_auth::Permission;
use figura_core::SkillId;
use figura_graph::EdgeKey;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/prerequisites", post(add_prerequisite))
        .route("/prerequisites/:parent", get(list_prerequisites))
        .route(
            "/prerequisites/:parent/:prerequisite",
            put(update_prerequisite).delete(remove_prerequisite),
        )
        .route("/skills/:skill/dependents", get(list_dependents))
        .route("/refresh", post(run_refresh))
        .route("/refresh/summary", get(refresh_summary))
}

fn edge_key(parent: &str, prerequisite: &str) -> Result<EdgeKey, axum::response::Response> {
    Ok(EdgeKey::new(
        errors::parse_id(parent, "parent skill")?,
        errors::parse_id(prerequisite, "prerequisite skill")?,
    ))
}

pub async fn add_prerequisite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddPrerequisiteRequest>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PREREQUISITES_MANAGE) {
        return res;
    }

    match services
        .prerequisites
        .add_edge(tenant.tenant_id(), body.parent, body.prerequisite, body.attributes())
        .await
    {
        Ok(edge) => (StatusCode::CREATED, Json(edge)).into_response(),
        Err(e) => errors::prerequisite_error_to_response(e),
    }
}

pub async fn update_prerequisite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((parent, prerequisite)): Path<(String, String)>,
    Json(body): Json<dto::UpdatePrerequisiteRequest>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PREREQUISITES_MANAGE) {
        return res;
    }
    let key = match edge_key(&parent, &prerequisite) {
        Ok(k) => k,
        Err(res) => return res,
    };

    match services
        .prerequisites
        .update_edge(tenant.tenant_id(), key, body.attributes())
        .await
    {
        Ok(edge) => (StatusCode::OK, Json(edge)).into_response(),
        Err(e) => errors::prerequisite_error_to_response(e),
    }
}

pub async fn remove_prerequisite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((parent, prerequisite)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PREREQUISITES_MANAGE) {
        return res;
    }
    let key = match edge_key(&parent, &prerequisite) {
        Ok(k) => k,
        Err(res) => return res,
    };

    match services.prerequisites.remove_edge(tenant.tenant_id(), key).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::prerequisite_error_to_response(e),
    }
}

pub async fn list_prerequisites(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(parent): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PREREQUISITES_READ) {
        return res;
    }
    let parent: SkillId = match errors::parse_id(&parent, "skill") {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.prerequisites.edges_for(tenant.tenant_id(), parent).await {
        Ok(edges) => Json(edges).into_response(),
        Err(e) => errors::prerequisite_error_to_response(e),
    }
}

pub async fn list_dependents(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(skill): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PREREQUISITES_READ) {
        return res;
    }
    let skill: SkillId = match errors::parse_id(&skill, "skill") {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.prerequisites.dependents(tenant.tenant_id(), skill).await {
        Ok(edges) => Json(edges).into_response(),
        Err(e) => errors::prerequisite_error_to_response(e),
    }
}

/// Run a refresh now; the response only covers the caller's tenant.
pub async fn run_refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::REFRESH_RUN) {
        return res;
    }
    let summary = services.run_refresh().await;
    Json(summary.for_tenant(tenant.tenant_id())).into_response()
}

/// Latest batch summary; 404 before the first run has finished.
pub async fn refresh_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::REFRESH_READ) {
        return res;
    }
    match services.refresh_board.latest() {
        Some(summary) => Json(summary.for_tenant(tenant.tenant_id())).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "no_refresh_yet", "no refresh run has completed"),
    }
}
