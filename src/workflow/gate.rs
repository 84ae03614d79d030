//! Authorization Gate: who may approve or reject.

use crate::errors::AppError;
use crate::middleware::rbac::Role;

const DECIDE_ACTION: &str = "approve or reject items";

#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    approvers: Vec<Role>,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(Self::default_approvers())
    }
}

impl AuthorizationGate {
    pub fn new(approvers: Vec<Role>) -> Self {
        Self { approvers }
    }

    pub fn default_approvers() -> Vec<Role> {
        vec![Role::Admin, Role::ProgramManager, Role::MeOfficer]
    }

    pub fn approvers(&self) -> &[Role] {
        &self.approvers
    }

    pub fn authorize(&self, role: &Role) -> Result<(), AppError> {
        if self.approvers.contains(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                role: role.to_string(),
                action: DECIDE_ACTION,
            })
        }
    }
}
