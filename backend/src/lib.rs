pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod membership;
pub mod models;
pub mod roles;

use std::sync::Arc;

use sqlx::PgPool;

use crate::mail::Mailer;

/// Shared application state available to all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub mailer: Arc<dyn Mailer>,
    /// Public base URL of the web app, used in invite links.
    pub base_url: String,
    /// Organisation creation requires billing to be enabled.
    pub billing_enabled: bool,
}

impl axum::extract::FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
