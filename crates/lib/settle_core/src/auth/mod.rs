//! Authentication and authorization logic.
//!
//! Provides password hashing, session token management, reset secrets and the
//! credential store shared by every login and reset flow in `settle_api`.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod secrets;
pub mod store;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email/password combination, or no such account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A customer account tried the staff login; carries where to go instead.
    #[error("This account signs in through the portal")]
    AudienceMismatch { redirect_to: String },

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid or expired reset code")]
    ResetCodeInvalidOrExpired,

    #[error("Invalid or expired reset token")]
    ResetTokenInvalidOrUsed,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
