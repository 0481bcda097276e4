//! Application error types.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use settle_core::auth::AuthError;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {message}")]
    AudienceMismatch { message: String, redirect_to: String },

    #[error("Internal server error")]
    Internal(String),
}

/// `Json` body extractor whose rejections become [`AppError::Validation`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(
            status = %rejection.status(),
            detail = %rejection.body_text(),
            "request body rejected"
        );
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
            _ => "Malformed request body",
        };
        AppError::Validation(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, redirect_to) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m, None),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m, None),
            AppError::AudienceMismatch {
                message,
                redirect_to,
            } => (
                StatusCode::FORBIDDEN,
                "audience_mismatch",
                message,
                Some(redirect_to),
            ),
            AppError::Internal(detail) => {
                error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            redirect_to,
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::AudienceMismatch { redirect_to } => AppError::AudienceMismatch {
                message: "Customer accounts sign in through the client portal".into(),
                redirect_to,
            },
            AuthError::TokenInvalid | AuthError::TokenExpired => {
                AppError::Unauthorized("Not authenticated".into())
            }
            e @ (AuthError::ResetCodeInvalidOrExpired | AuthError::ResetTokenInvalidOrUsed) => {
                AppError::Validation(e.to_string())
            }
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Db(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
