//! Password reset and change workflows.
//!
//! Two flows share one consumption model: the secret is stored as a digest and
//! consumed by a single conditional write in the credential store, which also
//! sets the new password. Whether that write affected a row decides success.

use chrono::{DateTime, Duration, Utc};
use settle_core::auth::AuthError;
use settle_core::auth::password::{
    hash_password_async, validate_new_password, verify_password_async,
};
use settle_core::auth::secrets::{
    RESET_CODE_MAX_MISSES, RESET_CODE_TTL_SECS, RESET_TOKEN_TTL_SECS, digest_secret,
    generate_reset_code, generate_reset_token, is_well_formed_code,
};
use settle_core::models::auth::{PortalSubject, Role, TokenClaims};
use tracing::{debug, info, warn};
use url::Url;

use crate::AppState;
use crate::routes::PORTAL_RESET_PASSWORD_PAGE;
use crate::services::notify::{ResetNotice, dispatch};

/// Generic acknowledgement for the code flow.
pub const RESET_CODE_SENT_MESSAGE: &str =
    "If an account exists for that email, a password reset code has been sent.";

/// Generic acknowledgement for the link flow.
pub const RESET_LINK_SENT_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

fn require(value: &str, field: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Count a failed code attempt for `email` and reject it.
async fn reject_code(state: &AppState, email: &str) -> Result<(), AuthError> {
    if state
        .store
        .record_reset_code_miss(email, RESET_CODE_MAX_MISSES)
        .await?
    {
        warn!(max_misses = RESET_CODE_MAX_MISSES, "reset code discarded after repeated misses");
    }
    Err(AuthError::ResetCodeInvalidOrExpired)
}

/// Issue a 6-digit code for `email`, replacing any pending one.
///
/// Returns the code when an account exists (for the development echo), and
/// `None` otherwise; unknown emails touch nothing in the store.
pub async fn request_reset_code(
    state: &AppState,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, AuthError> {
    require(email, "Email")?;

    let Some(user) = state.store.find_user_by_email(email).await? else {
        debug!("reset code requested for unknown email");
        return Ok(None);
    };

    let code = generate_reset_code();
    let expires_at = now + Duration::seconds(RESET_CODE_TTL_SECS);
    state
        .store
        .upsert_reset_code(&user.email, &digest_secret(&code), expires_at)
        .await?;
    info!(user_id = user.id, "reset code issued");

    dispatch(
        state.notifier.clone(),
        ResetNotice::Code {
            email: user.email,
            code: code.clone(),
        },
    );
    Ok(Some(code))
}

/// Check a code without consuming it. Every failed check counts toward
/// [`RESET_CODE_MAX_MISSES`].
pub async fn verify_reset_code(
    state: &AppState,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    require(email, "Email")?;
    require(code, "Code")?;
    if !is_well_formed_code(code) {
        return reject_code(state, email).await;
    }
    if !state
        .store
        .reset_code_is_valid(email, &digest_secret(code), now)
        .await?
    {
        return reject_code(state, email).await;
    }
    Ok(())
}

/// Consume a code and set a new password.
pub async fn reset_password_with_code(
    state: &AppState,
    email: &str,
    code: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    require(email, "Email")?;
    require(code, "Code")?;
    require(new_password, "New password")?;
    validate_new_password(new_password)?;
    if !is_well_formed_code(code) {
        return reject_code(state, email).await;
    }

    let hash = hash_password_async(new_password.to_string(), state.config.bcrypt_cost).await?;
    let consumed = state
        .store
        .consume_reset_code(email, &digest_secret(code), &hash, now)
        .await?;
    if !consumed {
        return reject_code(state, email).await;
    }
    info!("password reset with code");
    Ok(())
}

/// Build the portal reset link for a token.
pub fn reset_link(public_base_url: &str, token: &str) -> Result<String, AuthError> {
    let mut url = Url::parse(public_base_url)
        .and_then(|base| base.join(PORTAL_RESET_PASSWORD_PAGE))
        .map_err(|e| AuthError::Internal(format!("reset link: {e}")))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.to_string())
}

/// Issue a portal reset token for an agent (by portal email) or, failing
/// that, a customer. Same lookup priority as portal login.
pub async fn request_portal_reset(
    state: &AppState,
    email: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, AuthError> {
    require(email, "Email")?;

    let (subject, recipient) =
        if let Some(agent) = state.store.find_portal_agent_by_email(email).await? {
            (PortalSubject::Agent(agent.id), agent.portal_email)
        } else if let Some(customer) = state.store.find_portal_customer_by_email(email).await? {
            (PortalSubject::Customer(customer.user_id), customer.email)
        } else {
            debug!("portal reset requested for unknown email");
            return Ok(None);
        };

    let token = generate_reset_token();
    let expires_at = now + Duration::seconds(RESET_TOKEN_TTL_SECS);
    state
        .store
        .insert_portal_reset_token(subject, &digest_secret(&token), expires_at, now)
        .await?;
    info!(
        subject_kind = subject.kind(),
        subject_id = subject.id(),
        "portal reset token issued"
    );

    let url = reset_link(&state.config.public_base_url, &token)?;
    dispatch(
        state.notifier.clone(),
        ResetNotice::Link {
            email: recipient,
            url,
        },
    );
    Ok(Some(token))
}

/// Consume a portal reset token and set a new password.
pub async fn reset_portal_password(
    state: &AppState,
    token: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    require(token, "Token")?;
    require(new_password, "Password")?;
    validate_new_password(new_password)?;

    let hash = hash_password_async(new_password.to_string(), state.config.bcrypt_cost).await?;
    let Some(subject) = state
        .store
        .consume_portal_reset_token(&digest_secret(token), &hash, now)
        .await?
    else {
        return Err(AuthError::ResetTokenInvalidOrUsed);
    };
    info!(
        subject_kind = subject.kind(),
        subject_id = subject.id(),
        "portal password reset"
    );
    Ok(())
}

/// Change the password of the portal principal behind `claims`.
pub async fn change_portal_password(
    state: &AppState,
    claims: &TokenClaims,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    require(current_password, "Current password")?;
    require(new_password, "New password")?;
    validate_new_password(new_password)?;

    let (subject, current_hash) = if claims.is_portal_agent() {
        let agent = state
            .store
            .find_portal_agent_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        (
            PortalSubject::Agent(agent.id),
            agent.portal_password_hash.unwrap_or_default(),
        )
    } else {
        let user = state
            .store
            .find_user_by_id(claims.user_id)
            .await?
            .filter(|u| u.role == Role::Customer)
            .ok_or(AuthError::TokenInvalid)?;
        (PortalSubject::Customer(user.id), user.password_hash)
    };

    if !verify_password_async(current_password.to_string(), current_hash).await {
        return Err(AuthError::Validation(
            "Current password is incorrect".into(),
        ));
    }

    let hash = hash_password_async(new_password.to_string(), state.config.bcrypt_cost).await?;
    let updated = match subject {
        PortalSubject::Agent(id) => state.store.set_agent_portal_password(id, &hash).await?,
        PortalSubject::Customer(id) => state.store.set_user_password(id, &hash).await?,
    };
    if !updated {
        return Err(AuthError::TokenInvalid);
    }
    info!(
        subject_kind = subject.kind(),
        subject_id = subject.id(),
        "portal password changed"
    );
    Ok(())
}
