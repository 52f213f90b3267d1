use axum::{
    extract::{Path, Query, State},
    Json,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{is_unique_violation, AppError, Result},
    membership,
    models::common::{FindParams, PagedResult},
    models::member::{OrganisationMember, OrganisationMemberStatus},
    models::organisation::{
        is_valid_organisation_url, CreateOrganisationRequest, Organisation,
        OrganisationWithMember, UpdateOrganisationRequest,
    },
    roles::{OrganisationAction, OrganisationMemberRole},
    AppState,
};

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateOrganisationRequest>,
) -> Result<Json<Organisation>> {
    use validator::Validate;
    req.validate()?;

    let url = req.url.to_lowercase();
    if !is_valid_organisation_url(&url) {
        return Err(AppError::BadRequest(
            "Organisation URL can only contain lowercase letters, numbers, dashes and underscores."
                .into(),
        ));
    }

    // Organisation creation is tied to billing, which is not wired up yet.
    if !state.billing_enabled {
        return Err(AppError::NotImplemented);
    }

    let mut tx = state.pool.begin().await?;

    // No existence pre-check on the URL; the unique constraint decides and
    // its violation is classified below.
    let organisation = sqlx::query_as::<_, Organisation>(
        "INSERT INTO organisations (id, name, url, owner_user_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, url, owner_user_id, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(&url)
    .bind(auth.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "organisations_url_key") {
            AppError::AlreadyExists {
                field: "url",
                message: "Organisation URL already exists.".into(),
            }
        } else {
            e.into()
        }
    })?;

    // The creator becomes the owner and an admin member in the same
    // transaction.
    sqlx::query(
        "INSERT INTO organisation_members (id, organisation_id, user_id, role, status)
         VALUES ($1, $2, $3, $4, 'active')",
    )
    .bind(Uuid::new_v4())
    .bind(organisation.id)
    .bind(auth.id)
    .bind(OrganisationMemberRole::Admin)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(organisation))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Json(req): Json<UpdateOrganisationRequest>,
) -> Result<Json<Organisation>> {
    use validator::Validate;
    req.validate()?;

    let url = req.url.map(|u| u.to_lowercase());
    if let Some(url) = &url {
        if !is_valid_organisation_url(url) {
            return Err(AppError::BadRequest(
                "Organisation URL can only contain lowercase letters, numbers, dashes and underscores."
                    .into(),
            ));
        }
    }

    let mut tx = state.pool.begin().await?;

    membership::require_member_for_action(
        &mut *tx,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;

    let organisation = sqlx::query_as::<_, Organisation>(
        "UPDATE organisations
         SET name       = COALESCE($2, name),
             url        = COALESCE($3, url),
             updated_at = NOW()
         WHERE id = $1
         RETURNING id, name, url, owner_user_id, created_at, updated_at",
    )
    .bind(organisation_id)
    .bind(req.name.as_deref())
    .bind(url.as_deref())
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "organisations_url_key") {
            AppError::AlreadyExists {
                field: "url",
                message: "Organisation URL already exists.".into(),
            }
        } else {
            AppError::from(e)
        }
    })?
    .ok_or_else(|| AppError::NotFound("Organisation not found".into()))?;

    tx.commit().await?;

    Ok(Json(organisation))
}

#[derive(sqlx::FromRow)]
struct OrganisationWithMemberRow {
    id: Uuid,
    name: String,
    url: String,
    owner_user_id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    member_id: Uuid,
    member_role: OrganisationMemberRole,
    member_status: OrganisationMemberStatus,
    member_created_at: OffsetDateTime,
}

pub async fn find(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<FindParams>,
) -> Result<Json<PagedResult<OrganisationWithMember>>> {
    let rows = sqlx::query_as::<_, OrganisationWithMemberRow>(
        "SELECT o.id, o.name, o.url, o.owner_user_id, o.created_at, o.updated_at,
                m.id AS member_id, m.role AS member_role, m.status AS member_status,
                m.created_at AS member_created_at
         FROM organisations o
         JOIN organisation_members m ON m.organisation_id = o.id AND m.user_id = $1
         WHERE ($2::TEXT IS NULL OR o.name ILIKE '%' || $2 || '%')
         ORDER BY o.name
         LIMIT $3 OFFSET $4",
    )
    .bind(auth.id)
    .bind(params.term())
    .bind(params.per_page())
    .bind(params.offset())
    .fetch_all(&state.pool)
    .await?;

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM organisations o
         JOIN organisation_members m ON m.organisation_id = o.id AND m.user_id = $1
         WHERE ($2::TEXT IS NULL OR o.name ILIKE '%' || $2 || '%')",
    )
    .bind(auth.id)
    .bind(params.term())
    .fetch_one(&state.pool)
    .await?;

    let data = rows
        .into_iter()
        .map(|r| OrganisationWithMember {
            organisation: Organisation {
                id: r.id,
                name: r.name,
                url: r.url,
                owner_user_id: r.owner_user_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
            current_member: OrganisationMember {
                id: r.member_id,
                organisation_id: r.id,
                user_id: auth.id,
                role: r.member_role,
                status: r.member_status,
                created_at: r.member_created_at,
            },
        })
        .collect();

    Ok(Json(PagedResult::new(data, count, &params)))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let mut tx = state.pool.begin().await?;

    let organisation = membership::require_organisation(&mut *tx, organisation_id).await?;
    membership::require_member(&mut *tx, auth.id, organisation_id).await?;

    // Owners cannot leave; ownership must be transferred first.
    if organisation.owner_user_id == auth.id {
        return Err(AppError::Forbidden);
    }

    // Leaving while owning a team inside the organisation would orphan it.
    let owned_teams = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM teams WHERE organisation_id = $1 AND owner_user_id = $2",
    )
    .bind(organisation_id)
    .bind(auth.id)
    .fetch_one(&mut *tx)
    .await?;

    if owned_teams > 0 {
        return Err(AppError::UserHasTeams);
    }

    sqlx::query(
        "DELETE FROM organisation_members WHERE user_id = $1 AND organisation_id = $2",
    )
    .bind(auth.id)
    .bind(organisation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
