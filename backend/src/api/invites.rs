use std::collections::HashSet;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use futures::future::join_all;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    mail::invite_email,
    membership,
    models::common::{FindParams, PagedResult},
    models::invite::{
        generate_invite_token, partition_new_invitations, AcceptInviteResponse,
        CreateInvitesRequest, DeleteInvitationsRequest, InviteStatus, OrganisationMemberInvite,
        OrganisationMemberInviteView,
    },
    models::user::User,
    roles::OrganisationAction,
    AppState,
};

/// Mail lookups on the resend path are allowed to be slower than the default
/// client timeout.
const RESEND_MAIL_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Json(req): Json<CreateInvitesRequest>,
) -> Result<Json<serde_json::Value>> {
    use validator::Validate;
    req.validate()?;

    let mut tx = state.pool.begin().await?;

    let actor = membership::require_member_for_action(
        &mut *tx,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;
    let organisation = membership::require_organisation(&mut *tx, organisation_id).await?;

    let member_emails: HashSet<String> = sqlx::query_scalar::<_, String>(
        "SELECT LOWER(u.email)
         FROM organisation_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.organisation_id = $1",
    )
    .bind(organisation_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    let invite_emails: HashSet<String> = sqlx::query_scalar::<_, String>(
        "SELECT LOWER(email) FROM organisation_member_invites WHERE organisation_id = $1",
    )
    .bind(organisation_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    // Already-member and already-invited emails are dropped silently; the
    // batch as a whole is rejected if any surviving invitation proposes a
    // role the inviter cannot assign.
    let to_invite = partition_new_invitations(req.invitations, &member_emails, &invite_emails);

    if to_invite
        .iter()
        .any(|invitation| !actor.role.is_role_within_hierarchy(invitation.role))
    {
        return Err(AppError::Forbidden);
    }

    let mut created: Vec<(String, String)> = Vec::with_capacity(to_invite.len());

    for invitation in &to_invite {
        let token = generate_invite_token();

        sqlx::query(
            "INSERT INTO organisation_member_invites (id, organisation_id, email, role, status, token)
             VALUES ($1, $2, $3, $4, 'pending', $5)",
        )
        .bind(Uuid::new_v4())
        .bind(organisation_id)
        .bind(&invitation.email)
        .bind(invitation.role)
        .bind(&token)
        .execute(&mut *tx)
        .await?;

        created.push((invitation.email.clone(), token));
    }

    tx.commit().await?;

    // Dispatch happens after the commit: a failing mail provider must never
    // roll back persisted invites. Every send completes before the aggregate
    // result is raised.
    let sends = created.iter().map(|(email, token)| {
        let message = invite_email(
            &state.base_url,
            &organisation.name,
            &auth.name,
            email,
            token,
        );
        let mailer = state.mailer.clone();

        async move { mailer.send(&message).await }
    });

    let failed = join_all(sends)
        .await
        .into_iter()
        .filter(|result| {
            if let Err(e) = result {
                tracing::error!("Invite email failed: {:?}", e);
                return true;
            }
            false
        })
        .count();

    if failed > 0 {
        // Partial success: the invites stay persisted and must be resent
        // manually.
        return Err(AppError::EmailDelivery {
            failed,
            total: created.len(),
        });
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn resend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((organisation_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>> {
    membership::require_member_for_action(
        &state.pool,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;
    let organisation = membership::require_organisation(&state.pool, organisation_id).await?;

    let invite = sqlx::query_as::<_, OrganisationMemberInvite>(
        "SELECT id, organisation_id, email, role, status, token, created_at
         FROM organisation_member_invites
         WHERE id = $1 AND organisation_id = $2",
    )
    .bind(invitation_id)
    .bind(organisation_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No invite exists for this user".into()))?;

    // Resends reuse the stored token so previously sent acceptance links
    // stay valid.
    let message = invite_email(
        &state.base_url,
        &organisation.name,
        &auth.name,
        &invite.email,
        &invite.token,
    );

    let sent = tokio::time::timeout(RESEND_MAIL_TIMEOUT, state.mailer.send(&message)).await;

    match sent {
        Ok(Ok(())) => Ok(Json(serde_json::json!({ "ok": true }))),
        Ok(Err(e)) => {
            tracing::error!("Invite email resend failed: {:?}", e);
            Err(AppError::EmailDelivery { failed: 1, total: 1 })
        }
        Err(_) => {
            tracing::error!("Invite email resend timed out");
            Err(AppError::EmailDelivery { failed: 1, total: 1 })
        }
    }
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Json(req): Json<DeleteInvitationsRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut tx = state.pool.begin().await?;

    membership::require_member_for_action(
        &mut *tx,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;

    // Unmatched ids are a no-op.
    sqlx::query(
        "DELETE FROM organisation_member_invites
         WHERE id = ANY($1) AND organisation_id = $2",
    )
    .bind(&req.invitation_ids)
    .bind(organisation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn find(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organisation_id): Path<Uuid>,
    Query(params): Query<FindParams>,
) -> Result<Json<PagedResult<OrganisationMemberInviteView>>> {
    membership::require_member_for_action(
        &state.pool,
        auth.id,
        organisation_id,
        OrganisationAction::ManageOrganisation,
    )
    .await?;

    // The token column stays out of the select list.
    let rows = sqlx::query_as::<_, OrganisationMemberInviteView>(
        "SELECT id, organisation_id, email, role, status, created_at
         FROM organisation_member_invites
         WHERE organisation_id = $1
           AND ($2::TEXT IS NULL OR email ILIKE '%' || $2 || '%')
         ORDER BY email
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
         FROM organisation_member_invites
         WHERE organisation_id = $1
           AND ($2::TEXT IS NULL OR email ILIKE '%' || $2 || '%')",
    )
    .bind(organisation_id)
    .bind(params.term())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(PagedResult::new(rows, count, &params)))
}

/// Unauthenticated accept flow. The token arrives as a URL path segment and
/// is never read from the request body.
pub async fn accept(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<AcceptInviteResponse>> {
    let mut tx = state.pool.begin().await?;

    let invite = sqlx::query_as::<_, OrganisationMemberInvite>(
        "SELECT id, organisation_id, email, role, status, token, created_at
         FROM organisation_member_invites
         WHERE token = $1",
    )
    .bind(&token)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("This invite token is invalid or has expired".into()))?;

    let organisation = membership::require_organisation(&mut *tx, invite.organisation_id).await?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, is_active, created_at, updated_at
         FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(&invite.email)
    .fetch_optional(&mut *tx)
    .await?;

    let response = match user {
        // The invitee already has an account: membership is created and the
        // single-use invite is consumed in the same transaction.
        Some(user) => {
            sqlx::query(
                "INSERT INTO organisation_members (id, organisation_id, user_id, role, status)
                 VALUES ($1, $2, $3, $4, 'active')
                 ON CONFLICT (user_id, organisation_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(invite.organisation_id)
            .bind(user.id)
            .bind(invite.role)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM organisation_member_invites WHERE id = $1")
                .bind(invite.id)
                .execute(&mut *tx)
                .await?;

            AcceptInviteResponse::Joined {
                organisation_name: organisation.name,
            }
        }
        // No account yet: flag the invite as accepted so signup can pick it
        // up later. Repeat visits are a no-op.
        None => {
            if invite.status != InviteStatus::Accepted {
                sqlx::query(
                    "UPDATE organisation_member_invites SET status = 'accepted' WHERE id = $1",
                )
                .bind(invite.id)
                .execute(&mut *tx)
                .await?;
            }

            AcceptInviteResponse::AccountRequired {
                organisation_name: organisation.name,
                email: invite.email,
            }
        }
    };

    tx.commit().await?;

    Ok(Json(response))
}
