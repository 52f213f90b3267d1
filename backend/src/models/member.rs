use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::roles::OrganisationMemberRole;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "organisation_member_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrganisationMemberStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrganisationMember {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user_id: Uuid,
    pub role: OrganisationMemberRole,
    pub status: OrganisationMemberStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Member row joined with the user's display fields, as listed in the
/// members table of the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrganisationMemberWithUser {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user_id: Uuid,
    pub role: OrganisationMemberRole,
    pub status: OrganisationMemberStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganisationMemberRequest {
    pub role: OrganisationMemberRole,
}

#[derive(Debug, Deserialize)]
pub struct DeleteOrganisationMembersRequest {
    pub member_ids: Vec<Uuid>,
}
