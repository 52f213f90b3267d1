use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, Json};
use rand_core::OsRng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::{create_token, AuthUser},
    error::{is_unique_violation, AppError, Result},
    models::user::{LoginRequest, LoginResponse, SignupRequest, User, UserProfile},
    AppState,
};

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<LoginResponse>> {
    use validator::Validate;
    req.validate()?;

    let email = req.email.to_lowercase();

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
        .to_string();

    let mut tx = state.pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, email, password_hash, is_active, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(&email)
    .bind(&hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "users_email_key") {
            AppError::AlreadyExists {
                field: "email",
                message: "An account with this email already exists.".into(),
            }
        } else {
            e.into()
        }
    })?;

    // Consume invites the user accepted before having an account: each one
    // becomes a membership at the invited role.
    let accepted: Vec<(Uuid, Uuid, crate::roles::OrganisationMemberRole)> = sqlx::query_as(
        "SELECT id, organisation_id, role FROM organisation_member_invites
         WHERE LOWER(email) = $1 AND status = 'accepted'",
    )
    .bind(&email)
    .fetch_all(&mut *tx)
    .await?;

    for (invite_id, organisation_id, role) in accepted {
        sqlx::query(
            "INSERT INTO organisation_members (id, organisation_id, user_id, role, status)
             VALUES ($1, $2, $3, $4, 'active')
             ON CONFLICT (user_id, organisation_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(organisation_id)
        .bind(user.id)
        .bind(role)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM organisation_member_invites WHERE id = $1")
            .bind(invite_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let token = create_token(user.id, &state.jwt_secret, state.jwt_expiry_hours)
        .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
        },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, is_active, created_at, updated_at
         FROM users
         WHERE LOWER(email) = $1 AND is_active = true",
    )
    .bind(req.email.to_lowercase())
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let parsed = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid stored hash")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized)?;

    let token = create_token(user.id, &state.jwt_secret, state.jwt_expiry_hours)
        .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
        },
    }))
}

pub async fn me(State(pool): State<PgPool>, auth: AuthUser) -> Result<Json<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT id, name, email, is_active FROM users WHERE id = $1",
    )
    .bind(auth.id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(profile))
}
