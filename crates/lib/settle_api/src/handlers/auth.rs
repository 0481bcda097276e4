//! Staff authentication and code-based password reset handlers.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use settle_core::models::auth::Audience;

use crate::AppState;
use crate::error::{ApiJson, AppResult};
use crate::middleware::session::StaffSession;
use crate::models::{
    AuthUser, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
    MessageResponse, ResetPasswordRequest, SessionResponse, VerifyResetCodeRequest,
};
use crate::services::auth::{
    authenticate_staff, issue_session, normalize_email, require_credentials,
};
use crate::services::cookies::{clear_session_cookie, session_cookie};
use crate::services::reset;

/// `POST /api/auth/login`: staff login; sets `auth-token`.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let email = normalize_email(&body.email);
    require_credentials(&email, &body.password)?;

    let principal =
        authenticate_staff(state.store.as_ref(), &state.decoy, &email, &body.password).await?;
    let session = issue_session(principal, state.config.jwt_secret.as_bytes(), Utc::now())?;

    let jar = jar.add(session_cookie(
        Audience::Staff,
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

/// `POST /api/auth/logout`: clear the staff cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(clear_session_cookie(Audience::Staff, state.config.production));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

/// `GET /api/auth/me`: claims of the current staff session.
pub async fn me_handler(StaffSession(claims): StaffSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: AuthUser::from(&claims),
        expires_at: claims.exp,
    })
}

/// `POST /api/auth/forgot-password`: always 200 with the same message.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let email = normalize_email(&body.email);
    let code = reset::request_reset_code(&state, &email, Utc::now()).await?;
    Ok(Json(ForgotPasswordResponse {
        message: reset::RESET_CODE_SENT_MESSAGE.into(),
        code: code.filter(|_| !state.config.production),
        token: None,
    }))
}

/// `POST /api/auth/verify-reset-code`: check a code without consuming it.
pub async fn verify_reset_code_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyResetCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    reset::verify_reset_code(&state, &email, body.code.trim(), Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: "Code verified".into(),
    }))
}

/// `POST /api/auth/reset-password`: consume a code and set a new password.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    reset::reset_password_with_code(
        &state,
        &email,
        body.code.trim(),
        &body.new_password,
        Utc::now(),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset".into(),
    }))
}
