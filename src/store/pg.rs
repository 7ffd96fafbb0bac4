//! Postgres-backed [`OrgStore`] implementation.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;

use crate::store::models::{
    InvitationStatus, OrgInvitation, OrgMember, Organization, OrganizationDetail, UserProfile,
};
use crate::store::{OrgStore, StoreError};
use crate::types::{Role, RoleSet};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using DATABASE_URL, with pool sizing from config.
    pub async fn connect() -> Result<Self, StoreError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Connection("DATABASE_URL is not set".into()))?;
        let url = url::Url::parse(&base)
            .map_err(|_| StoreError::Connection("Invalid DATABASE_URL".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(crate::config::config().database.max_connections)
            .connect(url.as_str())
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".into()),
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                let constraint = db.constraint().unwrap_or("unknown").to_string();
                classify_pg_code(&code, constraint)
                    .unwrap_or_else(|| StoreError::Query(db.to_string()))
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Map Postgres SQLSTATE codes to store-agnostic error kinds. Returns `None`
/// for codes the taxonomy does not recognize.
pub fn classify_pg_code(code: &str, constraint: String) -> Option<StoreError> {
    match code {
        "23505" => {
            let field = field_for_constraint(&constraint);
            Some(StoreError::UniqueViolation { constraint, field })
        }
        "23503" => {
            let field = field_for_constraint(&constraint);
            Some(StoreError::ForeignKeyViolation { constraint, field })
        }
        // 08xxx: connection exceptions
        c if c.starts_with("08") => Some(StoreError::Connection(format!(
            "connection failure ({})",
            c
        ))),
        _ => None,
    }
}

fn field_for_constraint(constraint: &str) -> Option<String> {
    match constraint {
        "user_profiles_account_id_key" => Some("account_id".into()),
        "organizations_creator_name_key" => Some("name".into()),
        "org_members_org_account_key" => Some("account_id".into()),
        "org_invitations_token_key" => Some("token".into()),
        _ => None,
    }
}

fn roles_to_vec(roles: &RoleSet) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

fn roles_from_vec(raw: Vec<String>) -> RoleSet {
    raw.iter()
        .filter_map(|s| Role::parse(s))
        .collect::<BTreeSet<Role>>()
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn organization_from_row(row: &PgRow) -> Result<Organization, sqlx::Error> {
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<OrgMember, sqlx::Error> {
    let raw_roles: Vec<String> = row.try_get("roles")?;
    Ok(OrgMember {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        account_id: row.try_get("account_id")?,
        roles: roles_from_vec(raw_roles),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn invitation_from_row(row: &PgRow) -> Result<OrgInvitation, sqlx::Error> {
    let raw_roles: Vec<String> = row.try_get("roles")?;
    let raw_status: String = row.try_get("status")?;
    Ok(OrgInvitation {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        token: row.try_get("token")?,
        expires: row.try_get("expires")?,
        status: InvitationStatus::parse(&raw_status).unwrap_or(InvitationStatus::Expired),
        inviter_profile_id: row.try_get("inviter_profile_id")?,
        invitee_email: row.try_get("invitee_email")?,
        roles: roles_from_vec(raw_roles),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
    })
}

#[async_trait]
impl OrgStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_profile(&self, id: uuid::Uuid) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, name, email, created_at, updated_at, created_by, updated_by
            FROM user_profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| profile_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn find_profile_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, name, email, created_at, updated_at, created_by, updated_by
            FROM user_profiles
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| profile_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, account_id, name, email, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.account_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .bind(&profile.created_by)
        .bind(&profile.updated_by)
        .execute(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn update_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE user_profiles
            SET name = $2, email = $3, updated_at = $4, created_by = $5, updated_by = $6
            WHERE id = $1
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(profile.updated_at)
        .bind(&profile.created_by)
        .bind(&profile.updated_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Profile {} not found",
                profile.id
            )));
        }
        Ok(profile)
    }

    async fn insert_organization(
        &self,
        organization: Organization,
        owner: OrgMember,
    ) -> Result<Organization, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&organization.id)
        .bind(&organization.name)
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .bind(&organization.created_by)
        .bind(&organization.updated_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO org_members (id, organization_id, account_id, roles, active, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&owner.id)
        .bind(&owner.organization_id)
        .bind(&owner.account_id)
        .bind(roles_to_vec(&owner.roles))
        .bind(owner.active)
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .bind(&owner.created_by)
        .bind(&owner.updated_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(organization)
    }

    async fn find_organization(&self, org_id: &str) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at, updated_at, created_by, updated_by
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| organization_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn find_organization_detail(
        &self,
        org_id: &str,
    ) -> Result<Option<OrganizationDetail>, StoreError> {
        let Some(organization) = self.find_organization(org_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT id, organization_id, account_id, roles, active, created_at, updated_at, created_by, updated_by
            FROM org_members
            WHERE organization_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        let members = rows
            .iter()
            .map(member_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(OrganizationDetail {
            organization,
            members,
        }))
    }

    async fn list_organizations_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Organization>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.name, o.created_at, o.updated_at, o.created_by, o.updated_by
            FROM organizations o
            JOIN org_members m ON m.organization_id = o.id
            WHERE m.account_id = $1 AND m.active = true
            ORDER BY o.name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(organization_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn find_org_by_creator_and_name_ci(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at, updated_at, created_by, updated_by
            FROM organizations
            WHERE created_by = $1 AND lower(name) = lower($2)
            "#,
        )
        .bind(created_by)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| organization_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn update_organization(
        &self,
        organization: Organization,
    ) -> Result<Organization, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = $2, updated_at = $3, updated_by = $4
            WHERE id = $1
            "#,
        )
        .bind(&organization.id)
        .bind(&organization.name)
        .bind(organization.updated_at)
        .bind(&organization.updated_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Organization {} not found",
                organization.id
            )));
        }
        Ok(organization)
    }

    async fn delete_organization(&self, org_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM org_invitations WHERE organization_id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM org_members WHERE organization_id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn member_roles(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<RoleSet>, StoreError> {
        // Strict equality join; the organization must exist and the
        // membership must be active.
        let row = sqlx::query(
            r#"
            SELECT m.roles
            FROM org_members m
            JOIN organizations o ON o.id = m.organization_id
            WHERE m.organization_id = $1 AND m.account_id = $2 AND m.active = true
            "#,
        )
        .bind(org_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let raw: Vec<String> = r.try_get("roles").map_err(StoreError::from)?;
                Ok(Some(roles_from_vec(raw)))
            }
            None => Ok(None),
        }
    }

    async fn find_member(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<OrgMember>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, account_id, roles, active, created_at, updated_at, created_by, updated_by
            FROM org_members
            WHERE organization_id = $1 AND account_id = $2
            "#,
        )
        .bind(org_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| member_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn insert_member(&self, member: OrgMember) -> Result<OrgMember, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO org_members (id, organization_id, account_id, roles, active, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&member.id)
        .bind(&member.organization_id)
        .bind(&member.account_id)
        .bind(roles_to_vec(&member.roles))
        .bind(member.active)
        .bind(member.created_at)
        .bind(member.updated_at)
        .bind(&member.created_by)
        .bind(&member.updated_by)
        .execute(&self.pool)
        .await?;
        Ok(member)
    }

    async fn insert_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO org_invitations (id, organization_id, token, expires, status, inviter_profile_id, invitee_email, roles, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.organization_id)
        .bind(&invitation.token)
        .bind(invitation.expires)
        .bind(invitation.status.as_str())
        .bind(invitation.inviter_profile_id)
        .bind(&invitation.invitee_email)
        .bind(roles_to_vec(&invitation.roles))
        .bind(invitation.created_at)
        .bind(invitation.updated_at)
        .bind(&invitation.created_by)
        .bind(&invitation.updated_by)
        .execute(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn find_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<OrgInvitation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, token, expires, status, inviter_profile_id, invitee_email, roles, created_at, updated_at, created_by, updated_by
            FROM org_invitations
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| invitation_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn find_invitation(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<OrgInvitation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, token, expires, status, inviter_profile_id, invitee_email, roles, created_at, updated_at, created_by, updated_by
            FROM org_invitations
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(org_id)
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| invitation_from_row(&r)).transpose().map_err(Into::into)
    }

    async fn list_invitations(&self, org_id: &str) -> Result<Vec<OrgInvitation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, organization_id, token, expires, status, inviter_profile_id, invitee_email, roles, created_at, updated_at, created_by, updated_by
            FROM org_invitations
            WHERE organization_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(invitation_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn update_invitation(
        &self,
        invitation: OrgInvitation,
    ) -> Result<OrgInvitation, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE org_invitations
            SET token = $2, status = $3, updated_at = $4, updated_by = $5
            WHERE id = $1
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.token)
        .bind(invitation.status.as_str())
        .bind(invitation.updated_at)
        .bind(&invitation.updated_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Invitation {} not found",
                invitation.id
            )));
        }
        Ok(invitation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unique_violation() {
        let err = classify_pg_code("23505", "organizations_creator_name_key".into()).unwrap();
        match err {
            StoreError::UniqueViolation { constraint, field } => {
                assert_eq!(constraint, "organizations_creator_name_key");
                assert_eq!(field.as_deref(), Some("name"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn classifies_foreign_key_violation() {
        let err = classify_pg_code("23503", "org_members_org_account_key".into()).unwrap();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn classifies_connection_class_codes() {
        let err = classify_pg_code("08006", "unknown".into()).unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn unrecognized_codes_fall_through() {
        assert!(classify_pg_code("42601", "unknown".into()).is_none());
    }
}
