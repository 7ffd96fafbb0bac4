use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Action, Role, RoleSet};

/// Immutable capability snapshot for one `(area, organization)` pair.
/// Derived from the member's role set and never merged with snapshots of
/// other organizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    granted: BTreeSet<Action>,
}

impl PermissionSet {
    /// No capabilities at all. Used for non-members and for any lookup that
    /// fails to match a real active membership.
    pub fn empty() -> Self {
        Self {
            granted: BTreeSet::new(),
        }
    }

    /// Capabilities for an active member with the given roles. Bare active
    /// membership grants the view set; `owner` grants everything.
    pub fn from_roles(roles: &RoleSet) -> Self {
        let mut granted: BTreeSet<Action> = [Action::OrganizationView, Action::MemberView]
            .into_iter()
            .collect();

        if roles.contains(&Role::Owner) {
            granted.extend(Action::ALL);
        }

        Self { granted }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.granted.contains(&action)
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.granted.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn empty_set_allows_nothing() {
        let set = PermissionSet::empty();
        for action in Action::ALL {
            assert!(!set.allows(action));
        }
    }

    #[test]
    fn bare_membership_grants_view_only() {
        let set = PermissionSet::from_roles(&BTreeSet::new());
        assert!(set.allows(Action::OrganizationView));
        assert!(set.allows(Action::MemberView));
        assert!(!set.allows(Action::OrganizationUpdate));
        assert!(!set.allows(Action::OrganizationDelete));
        assert!(!set.allows(Action::InvitationCreate));
    }

    #[test]
    fn owner_role_grants_everything() {
        let roles: RoleSet = [Role::Owner].into_iter().collect();
        let set = PermissionSet::from_roles(&roles);
        for action in Action::ALL {
            assert!(set.allows(action), "owner should allow {:?}", action);
        }
    }
}
