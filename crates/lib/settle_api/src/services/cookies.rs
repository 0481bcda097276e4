//! Session cookies: set and clear httpOnly session cookies, one per audience.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use settle_core::auth::jwt::SESSION_LIFETIME_SECS;
use settle_core::models::auth::Audience;
use time::Duration;

/// Cookie carrying the staff session.
pub const STAFF_COOKIE: &str = "auth-token";
/// Cookie carrying the portal (agent/customer) session.
pub const PORTAL_COOKIE: &str = "portal-auth-token";

/// Cookie name for an audience.
pub fn cookie_name(audience: Audience) -> &'static str {
    match audience {
        Audience::Staff => STAFF_COOKIE,
        Audience::Portal => PORTAL_COOKIE,
    }
}

/// Build the httpOnly session cookie (7 days, `SameSite=Lax`, path `/`).
pub fn session_cookie(audience: Audience, token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((cookie_name(audience), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(SESSION_LIFETIME_SECS))
        .build()
}

/// Build an expired cookie to clear an audience's session.
pub fn clear_session_cookie(audience: Audience, secure: bool) -> Cookie<'static> {
    Cookie::build((cookie_name(audience), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Raw session token for an audience, if the request carries one.
pub fn session_token(jar: &CookieJar, audience: Audience) -> Option<String> {
    jar.get(cookie_name(audience))
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
