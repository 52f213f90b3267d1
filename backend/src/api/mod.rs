pub mod auth;
pub mod invites;
pub mod members;
pub mod organisations;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Organisations
        .route("/api/organisations", get(organisations::find).post(organisations::create))
        .route("/api/organisations/{id}", patch(organisations::update))
        .route("/api/organisations/{id}/leave", post(organisations::leave))
        // Members
        .route("/api/organisations/{id}/members", get(members::find).delete(members::delete))
        .route("/api/organisations/{id}/members/{member_id}", patch(members::update_role))
        // Invites
        .route(
            "/api/organisations/{id}/invites",
            get(invites::find).post(invites::create).delete(invites::delete),
        )
        .route(
            "/api/organisations/{id}/invites/{invitation_id}/resend",
            post(invites::resend),
        )
        // Unauthenticated acceptance landing flow; the token is a path
        // segment, never a body field.
        .route("/api/organisation-invites/{token}/accept", post(invites::accept))
        .with_state(state)
}
