//! Sharing and authorization models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level granted on a project. Ordered: `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[default]
    Read,
    Write,
    Admin,
}

impl Permission {
    /// Parse the integer representation stored in the database.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Permission::Read),
            1 => Some(Permission::Write),
            2 => Some(Permission::Admin),
            _ => None,
        }
    }

    /// Integer representation stored in the database.
    pub fn as_i64(&self) -> i64 {
        match self {
            Permission::Read => 0,
            Permission::Write => 1,
            Permission::Admin => 2,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

/// Direct access grant of a user on a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGrant {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Access grant of a team on a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGrant {
    pub id: i64,
    pub team_id: i64,
    pub project_id: i64,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a public link asks for a password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingType {
    #[default]
    WithoutPassword,
    WithPassword,
}

impl SharingType {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(SharingType::WithoutPassword),
            1 => Some(SharingType::WithPassword),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            SharingType::WithoutPassword => 0,
            SharingType::WithPassword => 1,
        }
    }
}

/// Public share link of a project. `hash` is the secret token in the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkShare {
    pub id: i64,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub project_id: i64,
    pub permission: Permission,
    #[serde(default)]
    pub sharing_type: SharingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub shared_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity invoking an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Principal {
    /// A registered user
    User { id: i64 },
    /// Someone holding a public share link
    LinkShare {
        id: i64,
        project_id: i64,
        permission: Permission,
    },
}

impl Principal {
    /// Shorthand for a user principal.
    pub fn user(id: i64) -> Self {
        Principal::User { id }
    }

    /// The user id, if this principal is a user.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Principal::User { id } => Some(*id),
            Principal::LinkShare { .. } => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User { id } => write!(f, "user:{}", id),
            Principal::LinkShare { id, .. } => write!(f, "link-share:{}", id),
        }
    }
}
