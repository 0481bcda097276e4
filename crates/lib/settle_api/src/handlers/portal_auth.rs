//! Portal (agent/customer) authentication handlers.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use settle_core::models::auth::Audience;

use crate::AppState;
use crate::error::{ApiJson, AppResult};
use crate::middleware::session::PortalSession;
use crate::models::{
    AuthUser, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
    LoginResponse, MessageResponse, PortalResetPasswordRequest, SessionResponse,
};
use crate::services::auth::{
    authenticate_portal, issue_session, normalize_email, require_credentials,
};
use crate::services::cookies::{clear_session_cookie, session_cookie};
use crate::services::reset;

/// `POST /api/portal/auth/login`: agent or customer login; sets `portal-auth-token`.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let email = normalize_email(&body.email);
    require_credentials(&email, &body.password)?;

    let principal =
        authenticate_portal(state.store.as_ref(), &state.decoy, &email, &body.password).await?;
    let session = issue_session(principal, state.config.jwt_secret.as_bytes(), Utc::now())?;

    let jar = jar.add(session_cookie(
        Audience::Portal,
        &session.token,
        state.config.production,
    ));
    Ok((
        jar,
        Json(LoginResponse {
            user: AuthUser::from(&session.principal),
        }),
    ))
}

/// `POST /api/portal/auth/logout`: clear the portal cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(clear_session_cookie(Audience::Portal, state.config.production));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

/// `GET /api/portal/auth/me`: claims of the current portal session.
pub async fn me_handler(PortalSession(claims): PortalSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: AuthUser::from(&claims),
        expires_at: claims.exp,
    })
}

/// `POST /api/portal/auth/forgot-password`: always 200; emails a reset link.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let email = normalize_email(&body.email);
    let token = reset::request_portal_reset(&state, &email, Utc::now()).await?;
    Ok(Json(ForgotPasswordResponse {
        message: reset::RESET_LINK_SENT_MESSAGE.into(),
        code: None,
        token: token.filter(|_| !state.config.production),
    }))
}

/// `POST /api/portal/auth/reset-password`: consume a link token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PortalResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    reset::reset_portal_password(&state, body.token.trim(), &body.password, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset".into(),
    }))
}

/// `POST /api/portal/auth/change-password`: requires a portal session.
pub async fn change_password_handler(
    State(state): State<AppState>,
    PortalSession(claims): PortalSession,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    reset::change_portal_password(&state, &claims, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}
