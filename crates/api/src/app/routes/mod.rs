use axum::{routing::get, Router};

pub mod admin;
pub mod groups;
pub mod plan_events;
pub mod suggestions;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/admin", admin::router())
        .nest("/suggestions", suggestions::router())
        .nest("/groups", groups::router())
        .nest("/plan-events", plan_events::router())
}
