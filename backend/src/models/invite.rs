use std::collections::HashSet;

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::roles::OrganisationMemberRole;

pub const INVITE_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invite_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrganisationMemberInvite {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub email: String,
    pub role: OrganisationMemberRole,
    pub status: InviteStatus,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Invite as exposed over the API. The token is deliberately absent.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrganisationMemberInviteView {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub email: String,
    pub role: OrganisationMemberRole,
    pub status: InviteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvitationInput {
    #[validate(email(message = "Please enter a valid email."))]
    pub email: String,
    pub role: OrganisationMemberRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitesRequest {
    #[validate(nested)]
    pub invitations: Vec<InvitationInput>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteInvitationsRequest {
    pub invitation_ids: Vec<Uuid>,
}

/// Outcome of the unauthenticated accept flow.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AcceptInviteResponse {
    /// The invitee already had an account; they are now a member.
    Joined { organisation_name: String },
    /// No account exists for the invite email yet. The invite is marked
    /// accepted and will be consumed when the account is created.
    AccountRequired {
        organisation_name: String,
        email: String,
    },
}

/// Single-use invite token: 32 alphanumeric characters, matching the link
/// format the web app expects.
pub fn generate_invite_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Drops invitations whose email already belongs to a current member or a
/// pending invite, and dedupes repeats within the batch itself. Dropping is
/// an idempotent no-op, not an error. Emails are compared case-insensitively
/// and returned lowercased.
pub fn partition_new_invitations(
    invitations: Vec<InvitationInput>,
    member_emails: &HashSet<String>,
    invite_emails: &HashSet<String>,
) -> Vec<InvitationInput> {
    let mut seen: HashSet<String> = HashSet::new();

    invitations
        .into_iter()
        .filter_map(|invitation| {
            let email = invitation.email.to_lowercase();

            if member_emails.contains(&email) || invite_emails.contains(&email) {
                return None;
            }

            if !seen.insert(email.clone()) {
                return None;
            }

            Some(InvitationInput {
                email,
                role: invitation.role,
            })
        })
        .collect()
}
