//! Permission guard applied by handlers before calling into services.

use axum::http::StatusCode;
use axum::response::Response;
use tracing::debug;

use figura_auth::{authorize, AuthzError, Permission, Principal, SchoolMembership};

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Check a single permission in the current request context.
pub fn check(tenant: &TenantContext, principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: SchoolMembership::from_roles(tenant.tenant_id(), principal.roles().to_vec()),
    };

    authorize(&principal, &Permission::new(permission))
}

/// [`check`], rendered as a 403 response on failure.
pub fn require(tenant: &TenantContext, principal: &PrincipalContext, permission: &'static str) -> Result<(), Response> {
    check(tenant, principal, permission).map_err(|e| {
        debug!(principal = %principal.principal_id(), permission, "forbidden");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
