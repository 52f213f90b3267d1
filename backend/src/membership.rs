//! Membership guard helpers.
//!
//! Authorization checks are expressed as membership lookups scoped to the
//! permitted roles: a caller who is not a member at all and a caller whose
//! role is not permitted get the same `NotFound`, so a rejection never
//! reveals that the organisation exists.
//!
//! All helpers take a `PgExecutor` so they run either on the pool or inside
//! the transaction wrapping a mutation.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::member::OrganisationMember;
use crate::models::organisation::Organisation;
use crate::roles::{OrganisationAction, OrganisationMemberRole};

const SELECT_MEMBER: &str = "SELECT id, organisation_id, user_id, role, status, created_at
     FROM organisation_members
     WHERE user_id = $1 AND organisation_id = $2";

/// The caller's membership row, or `NotFound` if they are not a member.
pub async fn require_member<'e, E>(
    executor: E,
    user_id: Uuid,
    organisation_id: Uuid,
) -> Result<OrganisationMember>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, OrganisationMember>(SELECT_MEMBER)
        .bind(user_id)
        .bind(organisation_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Organisation not found".into()))
}

/// The caller's membership row, restricted to the roles permitted to perform
/// `action`. Membership absence and insufficient role are indistinguishable.
pub async fn require_member_for_action<'e, E>(
    executor: E,
    user_id: Uuid,
    organisation_id: Uuid,
    action: OrganisationAction,
) -> Result<OrganisationMember>
where
    E: PgExecutor<'e>,
{
    let permitted: Vec<OrganisationMemberRole> = action.permitted_roles().to_vec();

    sqlx::query_as::<_, OrganisationMember>(&format!("{SELECT_MEMBER} AND role = ANY($3)"))
        .bind(user_id)
        .bind(organisation_id)
        .bind(permitted)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Organisation not found".into()))
}

/// The organisation row, or `NotFound`.
pub async fn require_organisation<'e, E>(executor: E, organisation_id: Uuid) -> Result<Organisation>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Organisation>(
        "SELECT id, name, url, owner_user_id, created_at, updated_at
         FROM organisations WHERE id = $1",
    )
    .bind(organisation_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("Organisation not found".into()))
}

/// All member rows of an organisation.
pub async fn fetch_members<'e, E>(
    executor: E,
    organisation_id: Uuid,
) -> Result<Vec<OrganisationMember>>
where
    E: PgExecutor<'e>,
{
    let members = sqlx::query_as::<_, OrganisationMember>(
        "SELECT id, organisation_id, user_id, role, status, created_at
         FROM organisation_members
         WHERE organisation_id = $1",
    )
    .bind(organisation_id)
    .fetch_all(executor)
    .await?;

    Ok(members)
}
