use figura_auth::{JwtClaims, PrincipalId, Role};
use figura_core::{Subject, TenantId};

/// The school a request acts in.
///
/// Always the token's `tenant_id`; paths and bodies never name a school.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Who is calling: a learner, an instructor, an admin or the plan service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    /// Both request contexts of a verified token.
    pub fn from_claims(claims: JwtClaims) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(claims.tenant_id),
            PrincipalContext::new(claims.sub, claims.roles),
        )
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// The caller as the learner behind `/suggestions`.
    pub fn own_subject(&self) -> Subject {
        Subject::Learner(self.principal_id.as_learner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figura_core::LearnerId;

    #[test]
    fn claims_split_into_school_and_caller() {
        let learner = LearnerId::new();
        let tenant = TenantId::new();
        let claims = JwtClaims {
            sub: PrincipalId::from_uuid(*learner.as_uuid()),
            tenant_id: tenant,
            roles: vec![Role::new(Role::LEARNER)],
            issued_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
        };

        let (school, caller) = PrincipalContext::from_claims(claims);
        assert_eq!(school.tenant_id(), tenant);
        assert_eq!(caller.own_subject(), Subject::Learner(learner));
        assert_eq!(caller.roles()[0].as_str(), "learner");
    }
}
