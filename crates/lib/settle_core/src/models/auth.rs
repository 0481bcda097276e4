//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `settle_api::models` (which use camelCase on the wire).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Resolved role of an account. Stored as a single `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Agent,
    Assistant,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Agent => "agent",
            Role::Assistant => "assistant",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "agent" => Ok(Role::Agent),
            "assistant" => Ok(Role::Assistant),
            "customer" => Ok(Role::Customer),
            other => Err(AuthError::Internal(format!("unknown role '{other}'"))),
        }
    }
}

/// One of the two independent authentication domains.
///
/// Each audience has its own cookie and its own token namespace: a token
/// minted for one audience never verifies for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// Internal users (admins, managers, agents, assistants).
    Staff,
    /// Agent and customer portal.
    Portal,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::Staff => "staff",
            Audience::Portal => "portal",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the `users` table: staff accounts and customer accounts.
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Agent with portal credentials (distinct from any staff login).
#[derive(Debug, Clone)]
pub struct PortalAgent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub portal_email: String,
    pub portal_password_hash: Option<String>,
    pub portal_access_enabled: bool,
    pub is_active: bool,
}

impl PortalAgent {
    /// Whether this record may sign in to the portal at all.
    pub fn is_portal_eligible(&self) -> bool {
        self.portal_access_enabled && self.is_active && self.portal_password_hash.is_some()
    }
}

/// Customer account resolved for the portal.
#[derive(Debug, Clone)]
pub struct PortalCustomer {
    /// Customer profile id (falls back to the user id when no profile row exists).
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}

/// Any entity capable of authenticating.
#[derive(Debug, Clone)]
pub enum Principal {
    Staff(StaffUser),
    Agent(PortalAgent),
    Customer(PortalCustomer),
}

impl Principal {
    /// Audience whose cookie carries this principal's session.
    pub fn audience(&self) -> Audience {
        match self {
            Principal::Staff(_) => Audience::Staff,
            Principal::Agent(_) | Principal::Customer(_) => Audience::Portal,
        }
    }

    /// Display name, if the record has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Principal::Staff(u) => u.name.as_deref(),
            Principal::Agent(a) => a.name.as_deref(),
            Principal::Customer(c) => c.name.as_deref(),
        }
    }

    /// Identity claims minted into the session token.
    pub fn subject(&self) -> SessionSubject {
        match self {
            Principal::Staff(u) => SessionSubject {
                sub: u.id.to_string(),
                user_id: u.id,
                email: u.email.clone(),
                role: u.role,
                is_agent: None,
            },
            Principal::Agent(a) => SessionSubject {
                sub: a.id.to_string(),
                user_id: a.id,
                email: a.portal_email.clone(),
                role: Role::Agent,
                is_agent: Some(true),
            },
            Principal::Customer(c) => SessionSubject {
                sub: c.user_id.to_string(),
                user_id: c.user_id,
                email: c.email.clone(),
                role: Role::Customer,
                is_agent: Some(false),
            },
        }
    }
}

/// Identity part of a session token, independent of its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    pub sub: String,
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub is_agent: Option<bool>,
}

/// JWT claims embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject (standard JWT `sub` claim).
    pub sub: String,
    /// Numeric id of the principal.
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    /// Set for portal sessions: `true` for agents, `false` for customers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_agent: Option<bool>,
    /// Audience the token was minted for (standard JWT `aud` claim).
    pub aud: Audience,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// Identity carried by these claims.
    pub fn subject(&self) -> SessionSubject {
        SessionSubject {
            sub: self.sub.clone(),
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
            is_agent: self.is_agent,
        }
    }

    /// Whether the session belongs to a portal agent.
    pub fn is_portal_agent(&self) -> bool {
        self.aud == Audience::Portal && self.is_agent == Some(true)
    }
}

/// Owner of a portal reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalSubject {
    /// Agent id; resets `agents.portal_password_hash`.
    Agent(i64),
    /// User id of a customer account; resets `users.password_hash`.
    Customer(i64),
}

impl PortalSubject {
    pub fn kind(self) -> &'static str {
        match self {
            PortalSubject::Agent(_) => "agent",
            PortalSubject::Customer(_) => "customer",
        }
    }

    pub fn id(self) -> i64 {
        match self {
            PortalSubject::Agent(id) | PortalSubject::Customer(id) => id,
        }
    }

    /// Rebuild from the `(subject_kind, subject_id)` columns.
    pub fn from_parts(kind: &str, id: i64) -> Result<Self, AuthError> {
        match kind {
            "agent" => Ok(PortalSubject::Agent(id)),
            "customer" => Ok(PortalSubject::Customer(id)),
            other => Err(AuthError::Internal(format!(
                "unknown reset token subject '{other}'"
            ))),
        }
    }
}
