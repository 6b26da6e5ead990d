/// Claim Set carried inside every access and refresh token.
///
/// Serialized field names (`userId`, `email`, `role`, `iat`, `exp`) match the
/// tokens already issued to browsers, so those keep verifying.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Authoritative for every authorization check downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counselor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Counselor => "counselor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Role::Student),
            "counselor" => Ok(Role::Counselor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The identity triple handed to the issuer by login, registration and refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: i64,
    pub email: String,
    pub role: Role,
}

/// Immutable claim set, minted fresh on every issue/refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub subject_id: i64,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix seconds)
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiration time (Unix seconds)
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    pub fn new(identity: &Identity, issued_at: i64, lifetime_seconds: i64) -> Self {
        Self {
            subject_id: identity.subject_id,
            email: identity.email.clone(),
            role: identity.role,
            issued_at,
            expires_at: issued_at.saturating_add(lifetime_seconds),
        }
    }

    /// A token is still valid during the second it expires
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.subject_id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}
