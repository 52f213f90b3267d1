use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::member::OrganisationMember;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub owner_user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// An organisation plus the requesting user's own membership row, as listed
/// on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrganisationWithMember {
    #[serde(flatten)]
    pub organisation: Organisation,
    pub current_member: OrganisationMember,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganisationRequest {
    #[validate(length(min = 3, max = 30, message = "Organisation name must be 3-30 characters long."))]
    pub name: String,
    #[validate(length(min = 3, max = 30, message = "Organisation URL must be 3-30 characters long."))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganisationRequest {
    #[validate(length(min = 3, max = 30, message = "Organisation name must be 3-30 characters long."))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 30, message = "Organisation URL must be 3-30 characters long."))]
    pub url: Option<String>,
}

/// URL slug rules beyond plain length checks: lowercase alphanumerics plus
/// dashes and underscores, no leading/trailing separators and no consecutive
/// separator runs.
pub fn is_valid_organisation_url(url: &str) -> bool {
    if !(3..=30).contains(&url.len()) {
        return false;
    }

    let bytes = url.as_bytes();
    let is_sep = |b: u8| b == b'-' || b == b'_';

    if is_sep(bytes[0]) || is_sep(bytes[bytes.len() - 1]) {
        return false;
    }

    let mut prev_sep = false;
    for &b in bytes {
        match b {
            b'a'..=b'z' | b'0'..=b'9' => prev_sep = false,
            b'-' | b'_' => {
                if prev_sep {
                    return false;
                }
                prev_sep = true;
            }
            _ => return false,
        }
    }

    true
}
