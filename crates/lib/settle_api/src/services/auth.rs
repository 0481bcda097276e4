//! Session issuer. Resolves credentials to a principal and mints its token.

use chrono::{DateTime, Utc};
use settle_core::auth::AuthError;
use settle_core::auth::jwt;
use settle_core::auth::password::{DecoyDigest, verify_password_async};
use settle_core::auth::store::CredentialStore;
use settle_core::models::auth::{Principal, Role, TokenClaims};
use tracing::{debug, info};

use crate::routes::PORTAL_LOGIN_PAGE;

/// A freshly minted session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub principal: Principal,
    pub token: String,
    pub claims: TokenClaims,
}

/// Normalize a submitted email for lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Reject empty email/password before touching the store.
pub fn require_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required".into(),
        ));
    }
    Ok(())
}

/// Staff login path.
///
/// Unknown email and wrong password fail identically, and both pay for one
/// bcrypt verify. A customer account with the right password gets
/// [`AuthError::AudienceMismatch`] pointing at the portal.
pub async fn authenticate_staff(
    store: &dyn CredentialStore,
    decoy: &DecoyDigest,
    email: &str,
    password: &str,
) -> Result<Principal, AuthError> {
    let Some(user) = store.find_user_by_email(email).await? else {
        decoy.verify(password).await;
        debug!("staff login: no active account");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password_async(password.to_string(), user.password_hash.clone()).await {
        debug!(user_id = user.id, "staff login: password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    if user.role == Role::Customer {
        info!(user_id = user.id, "staff login refused for customer account");
        return Err(AuthError::AudienceMismatch {
            redirect_to: PORTAL_LOGIN_PAGE.to_string(),
        });
    }

    Ok(Principal::Staff(user))
}

/// Portal login path.
///
/// An eligible agent (matched on `portal_email`) always takes priority; the
/// customer lookup only runs when no such agent exists.
pub async fn authenticate_portal(
    store: &dyn CredentialStore,
    decoy: &DecoyDigest,
    email: &str,
    password: &str,
) -> Result<Principal, AuthError> {
    if let Some(agent) = store.find_portal_agent_by_email(email).await? {
        let hash = agent.portal_password_hash.clone().unwrap_or_default();
        if verify_password_async(password.to_string(), hash).await {
            return Ok(Principal::Agent(agent));
        }
        debug!(agent_id = agent.id, "portal login: agent password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    if let Some(customer) = store.find_portal_customer_by_email(email).await? {
        if verify_password_async(password.to_string(), customer.password_hash.clone()).await {
            return Ok(Principal::Customer(customer));
        }
        debug!(user_id = customer.user_id, "portal login: customer password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    decoy.verify(password).await;
    debug!("portal login: no eligible agent or customer");
    Err(AuthError::InvalidCredentials)
}

/// Mint a session token for an authenticated principal.
pub fn issue_session(
    principal: Principal,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<IssuedSession, AuthError> {
    let (token, claims) = jwt::issue(&principal.subject(), principal.audience(), secret, now)?;
    info!(
        sub = %claims.sub,
        role = %claims.role,
        audience = %claims.aud,
        "session issued"
    );
    Ok(IssuedSession {
        principal,
        token,
        claims,
    })
}
