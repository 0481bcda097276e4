//! Page gatekeeper: per-request routing decisions for both audiences.
//!
//! Runs before every page handler. API routes, build assets and the favicon
//! pass through untouched; API handlers check their own session.
//!
//! | Route class | No cookie | Valid session                  | Invalid/expired        |
//! |-------------|-----------|--------------------------------|------------------------|
//! | protected   | → login   | through (+ refresh if < 1 day) | clear cookie, → login  |
//! | auth-only   | through   | → dashboard                    | clear cookie, through  |
//! | public      | through   | through                        | through                |

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use settle_core::auth::jwt;
use settle_core::models::auth::{Audience, TokenClaims};
use tracing::{debug, warn};

use crate::AppState;
use crate::routes::{
    PORTAL_DASHBOARD_PAGE, PORTAL_LOGIN_PAGE, STAFF_DASHBOARD_PAGE, STAFF_LOGIN_PAGE,
};
use crate::services::cookies::{clear_session_cookie, session_cookie, session_token};

/// Paths the gatekeeper never looks at.
const EXCLUDED_PREFIXES: &[&str] = &["/api", "/_next", "/static", "/assets"];
const EXCLUDED_PATHS: &[&str] = &["/favicon.ico"];

const STAFF_AUTH_ONLY: &[&str] = &["/login", "/forgot-password", "/reset-password"];
const STAFF_PROTECTED: &[&str] = &[
    "/dashboard",
    "/transactions",
    "/clients",
    "/agents",
    "/properties",
    "/documents",
    "/tasks",
    "/reports",
    "/templates",
    "/settings",
    "/profile",
];

const PORTAL_ROOT: &str = "/portal";
const PORTAL_AUTH_ONLY: &[&str] = &[
    "/portal/login",
    "/portal/forgot-password",
    "/portal/reset-password",
];

/// How the gatekeeper treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Requires a valid session of the audience.
    Protected(Audience),
    /// Login-type pages; an authenticated visitor is sent to the dashboard.
    AuthOnly(Audience),
}

/// Verified session claims, inserted into request extensions on protected routes.
#[derive(Debug, Clone)]
pub struct SessionClaims(pub TokenClaims);

/// `path` equals `prefix` or continues it with a new segment.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_excluded(path: &str) -> bool {
    if EXCLUDED_PATHS.contains(&path) || EXCLUDED_PREFIXES.iter().any(|p| is_under(path, p)) {
        return true;
    }
    // Static files (anything whose last segment has an extension).
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

/// Classify a request path.
pub fn classify(path: &str) -> RouteClass {
    if is_excluded(path) {
        return RouteClass::Public;
    }
    if PORTAL_AUTH_ONLY.iter().any(|p| is_under(path, p)) {
        return RouteClass::AuthOnly(Audience::Portal);
    }
    if is_under(path, PORTAL_ROOT) {
        return RouteClass::Protected(Audience::Portal);
    }
    if STAFF_AUTH_ONLY.iter().any(|p| is_under(path, p)) {
        return RouteClass::AuthOnly(Audience::Staff);
    }
    if STAFF_PROTECTED.iter().any(|p| is_under(path, p)) {
        return RouteClass::Protected(Audience::Staff);
    }
    RouteClass::Public
}

/// Login page of an audience.
pub fn login_page(audience: Audience) -> &'static str {
    match audience {
        Audience::Staff => STAFF_LOGIN_PAGE,
        Audience::Portal => PORTAL_LOGIN_PAGE,
    }
}

/// Landing page of an authenticated audience.
pub fn dashboard_page(audience: Audience) -> &'static str {
    match audience {
        Audience::Staff => STAFF_DASHBOARD_PAGE,
        Audience::Portal => PORTAL_DASHBOARD_PAGE,
    }
}

/// Axum middleware applying the route table above.
pub async fn gatekeeper(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = classify(&path);
    let secret = state.config.jwt_secret.as_bytes();
    let secure = state.config.production;
    let now = Utc::now();

    match class {
        RouteClass::Public => next.run(request).await,

        RouteClass::Protected(audience) => {
            let Some(token) = session_token(&jar, audience) else {
                debug!(%path, %audience, "no session, redirecting to login");
                return Redirect::temporary(login_page(audience)).into_response();
            };

            let claims = match jwt::verify(&token, audience, secret, now) {
                Ok(claims) => claims,
                Err(e) => {
                    debug!(%path, %audience, error = %e, "rejected session, redirecting to login");
                    let jar = jar.add(clear_session_cookie(audience, secure));
                    return (jar, Redirect::temporary(login_page(audience))).into_response();
                }
            };

            let refresh = jwt::needs_refresh(&claims, now);
            request
                .extensions_mut()
                .insert(SessionClaims(claims.clone()));
            let response = next.run(request).await;

            if !refresh {
                return response;
            }
            // Best effort: the request has already been served.
            match jwt::refresh(&claims, secret, now) {
                Ok((token, renewed)) => {
                    debug!(sub = %renewed.sub, %audience, exp = renewed.exp, "session refreshed");
                    let jar = jar.add(session_cookie(audience, &token, secure));
                    (jar, response).into_response()
                }
                Err(e) => {
                    warn!(sub = %claims.sub, %audience, error = %e, "session refresh failed");
                    response
                }
            }
        }

        RouteClass::AuthOnly(audience) => {
            let Some(token) = session_token(&jar, audience) else {
                return next.run(request).await;
            };
            match jwt::verify(&token, audience, secret, now) {
                Ok(_) => Redirect::temporary(dashboard_page(audience)).into_response(),
                Err(_) => {
                    let jar = jar.add(clear_session_cookie(audience, secure));
                    let response = next.run(request).await;
                    (jar, response).into_response()
                }
            }
        }
    }
}
