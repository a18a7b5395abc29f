//! The unit suggestions are computed for: a learner or a group, never both.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::id::{GroupId, LearnerId};

/// A learner or a learning group.
///
/// Modelled as an enum so a subject is always exactly one of the two.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    Learner(LearnerId),
    Group(GroupId),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Learner(_) => "learner",
            Subject::Group(_) => "group",
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Subject::Learner(id) => *id.as_uuid(),
            Subject::Group(id) => *id.as_uuid(),
        }
    }

    /// Rebuild a subject from its persisted `(kind, id)` pair.
    pub fn from_parts(kind: &str, id: Uuid) -> DomainResult<Self> {
        match kind {
            "learner" => Ok(Subject::Learner(LearnerId::from_uuid(id))),
            "group" => Ok(Subject::Group(GroupId::from_uuid(id))),
            other => Err(DomainError::validation(format!("unknown subject kind '{other}'"))),
        }
    }
}

impl From<LearnerId> for Subject {
    fn from(value: LearnerId) -> Self {
        Subject::Learner(value)
    }
}

impl From<GroupId> for Subject {
    fn from(value: GroupId) -> Self {
        Subject::Group(value)
    }
}

impl core::fmt::Display for Subject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.uuid())
    }
}
