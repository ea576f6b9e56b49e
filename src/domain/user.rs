use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    FieldOfficer,
    Supervisor,
    Executive,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::FieldOfficer,
        Role::Supervisor,
        Role::Executive,
        Role::Admin,
    ];

    /// Supervisors and admins drive every non-creation transition.
    pub fn is_supervisory(self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::FieldOfficer => "FIELD_OFFICER",
            Role::Supervisor => "SUPERVISOR",
            Role::Executive => "EXECUTIVE",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            role,
        }
    }
}

/// Identity handed over by the auth collaborator for every gated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: UserId,
    pub role: Role,
}

impl UserSession {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            role,
        }
    }
}

impl From<&User> for UserSession {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
        }
    }
}
