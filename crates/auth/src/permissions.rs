use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Something a principal may do inside one school, named `area.action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Grants every permission of the school.
    pub const ALL: &'static str = "*";

    /// View the prerequisite graph.
    pub const PREREQUISITES_READ: &'static str = "prerequisites.read";
    /// Add, reweight or remove prerequisite edges.
    pub const PREREQUISITES_MANAGE: &'static str = "prerequisites.manage";
    pub const SUGGESTIONS_READ: &'static str = "suggestions.read";
    pub const SUGGESTIONS_DECIDE: &'static str = "suggestions.decide";
    /// Read and decide on a training group's suggestions.
    pub const GROUP_SUGGESTIONS: &'static str = "groups.suggestions";
    /// Push learning-plan additions and removals.
    pub const PLANS_NOTIFY: &'static str = "plans.notify";
    pub const REFRESH_READ: &'static str = "refresh.read";
    pub const REFRESH_RUN: &'static str = "refresh.run";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether holding `self` is enough for `required`.
    pub fn covers(&self, required: &Permission) -> bool {
        self.as_str() == Self::ALL || self == required
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_everything_else_only_itself() {
        let manage = Permission::new(Permission::PREREQUISITES_MANAGE);
        assert!(Permission::new(Permission::ALL).covers(&manage));
        assert!(manage.covers(&manage));
        assert!(!Permission::new(Permission::PREREQUISITES_READ).covers(&manage));
    }
}
