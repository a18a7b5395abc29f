//! Static school-role → permission policy.

use crate::{Permission, Role, SchoolRole};

impl SchoolRole {
    /// Permissions this role holds in its school.
    pub fn grants(self) -> &'static [&'static str] {
        match self {
            SchoolRole::Admin => &[Permission::ALL],
            SchoolRole::Instructor => &[
                Permission::PREREQUISITES_READ,
                Permission::PREREQUISITES_MANAGE,
                Permission::SUGGESTIONS_READ,
                Permission::SUGGESTIONS_DECIDE,
                Permission::GROUP_SUGGESTIONS,
                Permission::REFRESH_READ,
            ],
            SchoolRole::Learner => &[Permission::SUGGESTIONS_READ, Permission::SUGGESTIONS_DECIDE],
            SchoolRole::Service => &[Permission::PLANS_NOTIFY],
        }
    }
}

/// Effective permissions of a token's roles, deduplicated.
///
/// Roles outside the school's vocabulary grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out: Vec<Permission> = Vec::new();
    for granted in roles.iter().filter_map(Role::school_role).map(SchoolRole::grants) {
        for p in granted {
            let p = Permission::new(*p);
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}
