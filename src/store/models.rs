use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RoleSet;

/// Internal user profile. `account_id` is the immutable external identity;
/// audit fields reference the internal profile id once one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub account_id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

/// Richer shape returned by the single-organization fetch. The bulk list
/// returns bare [`Organization`] rows; this adds the member roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<OrgMember>,
}

/// Join entity between a user and an organization. Only `active` members
/// count for access queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    pub id: String,
    pub organization_id: String,
    pub account_id: String,
    pub roles: RoleSet,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<InvitationStatus> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "declined" => Some(InvitationStatus::Declined),
            "expired" => Some(InvitationStatus::Expired),
            "revoked" => Some(InvitationStatus::Revoked),
            _ => None,
        }
    }
}

/// Pending grant of access. The token is single-use: every terminal
/// transition nulls it so it can never be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgInvitation {
    pub id: String,
    pub organization_id: String,
    pub token: Option<String>,
    pub expires: DateTime<Utc>,
    pub status: InvitationStatus,
    pub inviter_profile_id: Uuid,
    pub invitee_email: String,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl OrgInvitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!InvitationStatus::Pending.is_terminal());
        assert!(InvitationStatus::Accepted.is_terminal());
        assert!(InvitationStatus::Declined.is_terminal());
        assert!(InvitationStatus::Expired.is_terminal());
        assert!(InvitationStatus::Revoked.is_terminal());
    }
}
