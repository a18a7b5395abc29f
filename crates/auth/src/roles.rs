use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A role name as carried in the token's `roles` claim.
///
/// Tokens are issued by the school's identity service, which may know roles
/// this engine does not; those are kept verbatim and grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const INSTRUCTOR: &'static str = "instructor";
    pub const LEARNER: &'static str = "learner";
    pub const SERVICE: &'static str = "service";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The school role this name denotes, if any.
    pub fn school_role(&self) -> Option<SchoolRole> {
        SchoolRole::parse(self.as_str())
    }
}

impl From<SchoolRole> for Role {
    fn from(value: SchoolRole) -> Self {
        Self(Cow::Borrowed(value.as_str()))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who acts inside a school (tenant).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SchoolRole {
    /// Runs the school: everything, including manual refreshes.
    Admin,
    /// Authors the prerequisite graph and follows training groups.
    Instructor,
    /// Sees and decides on their own suggestions.
    Learner,
    /// The learning-plan subsystem pushing plan changes.
    Service,
}

impl SchoolRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            Role::ADMIN => Some(Self::Admin),
            Role::INSTRUCTOR => Some(Self::Instructor),
            Role::LEARNER => Some(Self::Learner),
            Role::SERVICE => Some(Self::Service),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => Role::ADMIN,
            Self::Instructor => Role::INSTRUCTOR,
            Self::Learner => Role::LEARNER,
            Self::Service => Role::SERVICE,
        }
    }
}
