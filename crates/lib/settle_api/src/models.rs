//! Request and response bodies (camelCase on the wire).
//!
//! Request fields default to empty so a missing field surfaces as a 400
//! validation error from the handler instead of a body-parse rejection.

use serde::{Deserialize, Serialize};
use settle_core::models::auth::{Principal, Role, TokenClaims};

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyResetCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Public view of an authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub user_id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_agent: Option<bool>,
}

impl From<&Principal> for AuthUser {
    fn from(principal: &Principal) -> Self {
        let subject = principal.subject();
        // Customers are addressed by their profile id in the portal.
        let id = match principal {
            Principal::Customer(c) => c.id.to_string(),
            _ => subject.sub,
        };
        Self {
            id,
            user_id: subject.user_id,
            email: subject.email,
            name: principal.name().map(str::to_string),
            role: subject.role,
            is_agent: subject.is_agent,
        }
    }
}

impl From<&TokenClaims> for AuthUser {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            id: claims.sub.clone(),
            user_id: claims.user_id,
            email: claims.email.clone(),
            name: None,
            role: claims.role,
            is_agent: claims.is_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: AuthUser,
    /// Expiry of the current session (unix timestamp).
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Forgot-password acknowledgement. Identical whether or not the account
/// exists, except for the development-only echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub version: String,
    pub store_connected: bool,
}
