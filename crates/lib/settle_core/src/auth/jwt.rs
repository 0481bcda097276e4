//! Session token signing and verification (HS256).
//!
//! Every token carries its audience in the `aud` claim and lives exactly
//! [`SESSION_LIFETIME_SECS`] from mint. Expiry is checked against the caller's
//! clock with zero leeway.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::AuthError;
use crate::models::auth::{Audience, SessionSubject, TokenClaims};

/// Session token lifetime: 7 days.
pub const SESSION_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Remaining lifetime below which the gatekeeper re-mints: 1 day.
pub const REFRESH_THRESHOLD_SECS: i64 = 24 * 60 * 60;

/// Build claims for `subject` issued at `now`.
pub fn claims_for(subject: &SessionSubject, audience: Audience, now: DateTime<Utc>) -> TokenClaims {
    TokenClaims {
        sub: subject.sub.clone(),
        user_id: subject.user_id,
        email: subject.email.clone(),
        role: subject.role,
        is_agent: subject.is_agent,
        aud: audience,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(SESSION_LIFETIME_SECS)).timestamp(),
    }
}

/// Sign an arbitrary claim set.
pub fn sign(claims: &TokenClaims, secret: &[u8]) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Mint a fresh session token for `subject`.
pub fn issue(
    subject: &SessionSubject,
    audience: Audience,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<(String, TokenClaims), AuthError> {
    let claims = claims_for(subject, audience, now);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

/// Verify a token minted for `audience`, returning its claims.
///
/// Bad signature, wrong audience, wrong algorithm or a malformed token yield
/// [`AuthError::TokenInvalid`]; an elapsed `exp` yields [`AuthError::TokenExpired`].
pub fn verify(
    token: &str,
    audience: Audience,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<TokenClaims, AuthError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is compared below against the injected clock.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_audience(&[audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "sub", "aud"]);

    let claims = decode::<TokenClaims>(token, &key, &validation)
        .map_err(|_| AuthError::TokenInvalid)?
        .claims;

    if claims.aud != audience {
        return Err(AuthError::TokenInvalid);
    }
    if claims.exp <= now.timestamp() {
        return Err(AuthError::TokenExpired);
    }
    Ok(claims)
}

/// Whether a verified token is close enough to expiry to be re-minted.
pub fn needs_refresh(claims: &TokenClaims, now: DateTime<Utc>) -> bool {
    claims.exp - now.timestamp() < REFRESH_THRESHOLD_SECS
}

/// Re-mint with identical identity claims and a fresh 7-day window.
pub fn refresh(
    claims: &TokenClaims,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<(String, TokenClaims), AuthError> {
    issue(&claims.subject(), claims.aud, secret, now)
}
