/// Shared identity and capability types used across the codebase

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External account identifier issued by the auth provider.
///
/// Never used as an audit field once a profile exists; the single conversion
/// point to [`InternalProfileId`] is the pipeline's profile resolution step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalAccountId(pub String);

impl ExternalAccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ExternalAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal profile identifier. All audit fields reference this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InternalProfileId(pub Uuid);

impl fmt::Display for InternalProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles carried on an organization membership. `Owner` is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

pub type RoleSet = BTreeSet<Role>;

/// Permission area. Permission cache keys are `(area, organization_id)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Organization,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Organization => "organization",
        }
    }
}

/// Actions a capability check can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "organization:view")]
    OrganizationView,
    #[serde(rename = "organization:update")]
    OrganizationUpdate,
    #[serde(rename = "organization:delete")]
    OrganizationDelete,
    #[serde(rename = "member:view")]
    MemberView,
    #[serde(rename = "member:manage")]
    MemberManage,
    #[serde(rename = "invitation:view")]
    InvitationView,
    #[serde(rename = "invitation:create")]
    InvitationCreate,
    #[serde(rename = "invitation:revoke")]
    InvitationRevoke,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::OrganizationView,
        Action::OrganizationUpdate,
        Action::OrganizationDelete,
        Action::MemberView,
        Action::MemberManage,
        Action::InvitationView,
        Action::InvitationCreate,
        Action::InvitationRevoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::OrganizationView => "organization:view",
            Action::OrganizationUpdate => "organization:update",
            Action::OrganizationDelete => "organization:delete",
            Action::MemberView => "member:view",
            Action::MemberManage => "member:manage",
            Action::InvitationView => "invitation:view",
            Action::InvitationCreate => "invitation:create",
            Action::InvitationRevoke => "invitation:revoke",
        }
    }

    pub fn parse(s: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.as_str() == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!(Role::parse("owner"), Some(Role::Owner));
        assert_eq!(Role::parse("member"), Some(Role::Member));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Owner.as_str(), "owner");
    }

    #[test]
    fn action_parse_covers_all_variants() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("organization:explode"), None);
    }
}
