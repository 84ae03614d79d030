use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Actor;

/// Roles carried in the `role` claim of a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    ProgramManager,
    MeOfficer,
    DataEntry,
    Viewer,
    Custom(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "admin" | "administrator" => Role::Admin,
            "program manager" => Role::ProgramManager,
            "m&e officer" | "me officer" | "mne officer" | "m and e officer" => Role::MeOfficer,
            "data entry" | "data entry officer" => Role::DataEntry,
            "viewer" => Role::Viewer,
            _ => Role::Custom(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "Admin",
            Role::ProgramManager => "Program Manager",
            Role::MeOfficer => "M&E Officer",
            Role::DataEntry => "Data Entry",
            Role::Viewer => "Viewer",
            Role::Custom(name) => name,
        }
    }

    /// Check if this role has the required permission level.
    ///
    /// Approval decisions are not covered here; the configurable approver
    /// set in [`crate::workflow::gate::AuthorizationGate`] decides those.
    pub fn has_permission(&self, required: &Permission) -> bool {
        match required {
            Permission::Read => true, // all roles can read
            Permission::Submit => !matches!(self, Role::Viewer),
            Permission::Administer => matches!(self, Role::Admin),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Permission levels for RBAC enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Read,
    /// Create items and submit drafts for review.
    Submit,
    /// Deactivate, suspend or reactivate approved items.
    Administer,
}

impl Permission {
    fn action(&self) -> &'static str {
        match self {
            Permission::Read => "read items",
            Permission::Submit => "create or submit items",
            Permission::Administer => "change the administrative status of items",
        }
    }
}

/// Helper to check RBAC in workflow operations; returns 403 on failure.
pub fn enforce(actor: &Actor, permission: &Permission) -> Result<(), AppError> {
    if actor.role.has_permission(permission) {
        return Ok(());
    }
    tracing::warn!(
        actor = %actor.id,
        role = %actor.role,
        permission = ?permission,
        "RBAC access denied"
    );
    Err(AppError::Forbidden {
        role: actor.role.to_string(),
        action: permission.action(),
    })
}

// ── Tests ───────────────────────────────────────────────────────
