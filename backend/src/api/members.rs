use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    membership,
    models::common::{FindParams, PagedResult},
    models::member::{
        DeleteOrganisationMembersRequest, OrganisationMember, OrganisationMemberWithUser,
        UpdateOrganisationMemberRequest,
    },
    roles::OrganisationAction,
    AppState,
};

pub async fn find(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Query(params): Query<FindParams>,
) -> Result<Json<PagedResult<OrganisationMemberWithUser>>> {
    // Any member may list the roster; no role scoping here.
    membership::require_member(&state.pool, auth.id, organisation_id).await?;

    let rows = sqlx::query_as::<_, OrganisationMemberWithUser>(
        "SELECT m.id, m.organisation_id, m.user_id, m.role, m.status, m.created_at,
                u.name, u.email
         FROM organisation_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.organisation_id = $1
           AND ($2::TEXT IS NULL OR u.name ILIKE '%' || $2 || '%')
         ORDER BY u.name
         LIMIT $3 OFFSET $4",
    )
    .bind(organisation_id)
    .bind(params.term())
    .bind(params.per_page())
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await?;

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM organisation_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.organisation_id = $1
           AND ($2::TEXT IS NULL OR u.name ILIKE '%' || $2 || '%')",
    )
    .bind(organisation_id)
    .bind(params.term())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(PagedResult::new(rows, count, &params)))
}

pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((organisation_id, member_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateOrganisationMemberRequest>,
) -> Result<Json<OrganisationMember>> {
    let mut tx = state.pool.begin().await?;

    let organisation = membership::require_organisation(&mut *tx, organisation_id).await?;
    let actor = membership::require_member_for_action(
        &mut *tx,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;

    let members = membership::fetch_members(&mut *tx, organisation_id).await?;
    let target = members
        .iter()
        .find(|m| m.id == member_id)
        .ok_or_else(|| AppError::NotFound("Organisation member does not exist".into()))?;

    // Three checks, first failure wins: the owner is immune, the actor must
    // outrank the target's current role, and the actor must be able to
    // assign the proposed role (blocks privilege escalation by role-change).
    if target.user_id == organisation.owner_user_id {
        return Err(AppError::Forbidden);
    }

    if !actor.role.is_role_within_hierarchy(target.role) {
        return Err(AppError::Forbidden);
    }

    if !actor.role.is_role_within_hierarchy(req.role) {
        return Err(AppError::Forbidden);
    }

    let updated = sqlx::query_as::<_, OrganisationMember>(
        "UPDATE organisation_members
         SET role = $3
         WHERE id = $1 AND organisation_id = $2 AND user_id <> $4
         RETURNING id, organisation_id, user_id, role, status, created_at",
    )
    .bind(member_id)
    .bind(organisation_id)
    .bind(req.role)
    .bind(organisation.owner_user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Organisation member does not exist".into()))?;

    tx.commit().await?;

    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Json(req): Json<DeleteOrganisationMembersRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut tx = state.pool.begin().await?;

    let organisation = membership::require_organisation(&mut *tx, organisation_id).await?;
    let actor = membership::require_member_for_action(
        &mut *tx,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;

    let members = membership::fetch_members(&mut *tx, organisation_id).await?;
    let targets: Vec<&OrganisationMember> = members
        .iter()
        .filter(|m| req.member_ids.contains(&m.id))
        .collect();

    if targets
        .iter()
        .any(|m| m.user_id == organisation.owner_user_id)
    {
        return Err(AppError::Forbidden);
    }

    if targets
        .iter()
        .any(|m| !actor.role.is_role_within_hierarchy(m.role))
    {
        return Err(AppError::Forbidden);
    }

    // One batch delete; the owner row is never touched.
    sqlx::query(
        "DELETE FROM organisation_members
         WHERE id = ANY($1) AND organisation_id = $2 AND user_id <> $3",
    )
    .bind(&req.member_ids)
    .bind(organisation_id)
    .bind(organisation.owner_user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
