use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use figura_core::{LearnerId, TenantId};

/// The `sub` of a verified token.
///
/// For learners this is their learner id; instructors, admins and the plan
/// service carry identity-service ids that never appear as subjects here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Read this principal as the learner whose suggestions it owns.
    pub fn as_learner(&self) -> LearnerId {
        LearnerId::from_uuid(self.0)
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// What a principal holds in the one school its token was issued for.
///
/// Built per request from the token's `tenant_id` and `roles`; permissions
/// are already resolved through the role policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}

impl SchoolMembership {
    /// Membership derived from token roles via `permissions_for_roles`.
    pub fn from_roles(tenant_id: TenantId, roles: Vec<crate::Role>) -> Self {
        let permissions = crate::permissions_for_roles(&roles);
        Self {
            tenant_id,
            roles,
            permissions,
        }
    }
}
