use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{message}")]
    AlreadyExists {
        field: &'static str,
        message: String,
    },

    #[error("You cannot leave an organisation while you own a team in it")]
    UserHasTeams,

    #[error("Failed to send invite emails to {failed}/{total} users")]
    EmailDelivery { failed: usize, total: usize },

    #[error("Not implemented")]
    NotImplemented,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Classification code exposed at the transport boundary. Domain errors
    /// propagate unmodified from the point of detection to here.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHENTICATED",
            AppError::Forbidden => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::AlreadyExists { .. } => "ALREADY_EXISTS",
            AppError::UserHasTeams => "USER_HAS_TEAMS",
            AppError::EmailDelivery { .. } => "EMAIL_DELIVERY_FAILED",
            AppError::NotImplemented => "NOT_IMPLEMENTED",
            AppError::Database(_) => "INTERNAL",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();

        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            // Generic message: never reveal which permission or hierarchy
            // rule failed.
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UserHasTeams => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::EmailDelivery { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Validation(e) => {
                let messages: Vec<String> = e
                    .field_errors()
                    .into_iter()
                    .map(|(field, errors)| {
                        let msgs: Vec<&str> = errors
                            .iter()
                            .filter_map(|err| err.message.as_ref().map(|m| m.as_ref()))
                            .collect();
                        if msgs.is_empty() {
                            let codes: Vec<&str> =
                                errors.iter().map(|err| err.code.as_ref()).collect();
                            format!("{}: {}", field, codes.join(", "))
                        } else {
                            format!("{}: {}", field, msgs.join(", "))
                        }
                    })
                    .collect();
                (StatusCode::BAD_REQUEST, messages.join("; "))
            }
            AppError::AlreadyExists { field, message } => {
                // Attach the offending field so the caller UI can highlight it.
                return (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": message, "code": code, "field": field })),
                )
                    .into_response();
            }
            AppError::NotImplemented => (StatusCode::NOT_IMPLEMENTED, self.to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// Whether `err` is a Postgres unique violation on the named constraint.
///
/// Uniqueness is enforced by the store and classified after the fact; there
/// is deliberately no existence pre-check before inserts and updates, so two
/// concurrent writers of the same value race at the constraint instead of in
/// application code.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some(constraint);
    }

    false
}

pub type Result<T> = std::result::Result<T, AppError>;
