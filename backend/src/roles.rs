//! Organisation roles and the actions they permit.
//!
//! The hierarchy is fixed: admins sit above managers, managers above plain
//! members. A role may only ever assign or manage roles within its own
//! hierarchy, which makes privilege escalation by role-change impossible.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "organisation_member_role", rename_all = "lowercase")]
pub enum OrganisationMemberRole {
    Admin,
    Manager,
    Member,
}

/// Actions gated on an organisation role rather than on a specific resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganisationAction {
    ManageOrganisation,
    ManageBilling,
    DeleteOrganisationTransferRequest,
}

use OrganisationMemberRole::{Admin, Manager, Member};

impl OrganisationMemberRole {
    /// The roles this role sits above (inclusive of itself).
    pub fn manageable_roles(self) -> &'static [OrganisationMemberRole] {
        match self {
            Admin => &[Admin, Manager, Member],
            Manager => &[Manager, Member],
            Member => &[Member],
        }
    }

    /// Whether `target` is at or below this role in the hierarchy.
    pub fn is_role_within_hierarchy(self, target: OrganisationMemberRole) -> bool {
        self.manageable_roles().contains(&target)
    }

    pub fn can_execute(self, action: OrganisationAction) -> bool {
        action.permitted_roles().contains(&self)
    }
}

impl OrganisationAction {
    /// The roles permitted to perform this action.
    pub fn permitted_roles(self) -> &'static [OrganisationMemberRole] {
        match self {
            OrganisationAction::ManageOrganisation => &[Admin, Manager],
            OrganisationAction::ManageBilling => &[Admin],
            OrganisationAction::DeleteOrganisationTransferRequest => &[Admin],
        }
    }
}
