use serde::{Deserialize, Serialize};

use crate::middleware::rbac::Role;

/// The authenticated user behind a request.
///
/// Produced per request by the auth provider and passed explicitly into
/// every workflow call; there is no process-wide session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}
