//! Learning-plan notifications: a skill added to a plan accepts its
//! suggestion, a removal returns it to pending.

use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;
use tracing::info;

use figura_auth::Permission;
use figura_infra::services::PlanChange;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", post(plan_event))
}

pub async fn plan_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(change): Json<PlanChange>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&tenant, &principal, Permission::PLANS_NOTIFY) {
        return res;
    }

    match services
        .suggestions
        .apply_plan_change(tenant.tenant_id(), change, Utc::now())
        .await
    {
        Ok(outcome) => {
            info!(subject = %change.subject, skill = %change.skill_id, change = ?change.change, outcome = outcome.as_str(), "plan change applied");
            Json(dto::DecisionResponse::from(outcome)).into_response()
        }
        Err(e) => errors::suggestion_error_to_response(e),
    }
}
