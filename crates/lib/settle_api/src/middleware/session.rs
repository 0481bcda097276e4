//! Session extractors for API handlers.
//!
//! API routes are outside the gatekeeper, so each handler that needs a caller
//! identity takes one of these extractors: cookie → verified claims, or 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use settle_core::auth::{AuthError, jwt};
use settle_core::models::auth::{Audience, TokenClaims};

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::session_token;

/// Verify the audience's session cookie carried by `parts`.
fn verified_claims(
    parts: &Parts,
    state: &AppState,
    audience: Audience,
) -> Result<TokenClaims, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = session_token(&jar, audience).ok_or(AuthError::TokenInvalid)?;
    let claims = jwt::verify(&token, audience, state.config.jwt_secret.as_bytes(), Utc::now())?;
    Ok(claims)
}

/// Caller holding a valid staff session.
#[derive(Debug, Clone)]
pub struct StaffSession(pub TokenClaims);

impl FromRequestParts<AppState> for StaffSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verified_claims(parts, state, Audience::Staff).map(StaffSession)
    }
}

/// Caller holding a valid portal session.
#[derive(Debug, Clone)]
pub struct PortalSession(pub TokenClaims);

impl FromRequestParts<AppState> for PortalSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        verified_claims(parts, state, Audience::Portal).map(PortalSession)
    }
}
