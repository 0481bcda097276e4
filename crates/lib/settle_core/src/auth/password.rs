//! Password hashing via bcrypt.
//!
//! Digests are salted internally, so hashing the same plaintext twice yields
//! different strings. Verification never errors: a malformed digest simply
//! does not match.

use std::sync::Arc;

use tracing::debug;

use super::AuthError;
use super::secrets::generate_reset_token;

/// Default bcrypt cost factor.
pub const DEFAULT_COST: u32 = 10;

/// Lowest cost accepted from configuration.
pub const MIN_CONFIGURED_COST: u32 = 10;

/// Highest cost accepted from configuration.
pub const MAX_CONFIGURED_COST: u32 = 14;

/// Minimum length of a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matched) => matched,
        Err(e) => {
            debug!(error = %e, "bcrypt verify rejected stored digest");
            false
        }
    }
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`] characters.
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash on the blocking pool so bcrypt never stalls the async runtime.
pub async fn hash_password_async(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

/// Verify on the blocking pool.
pub async fn verify_password_async(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

/// Digest of a random throwaway secret, verified when a login finds no
/// account so that a miss costs the same bcrypt work as a wrong password.
#[derive(Debug, Clone)]
pub struct DecoyDigest(Arc<str>);

impl DecoyDigest {
    /// Hash a fresh random secret at `cost`.
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        Ok(Self(hash_password(&generate_reset_token(), cost)?.into()))
    }

    /// Run a full verify against the decoy. Never matches.
    pub async fn verify(&self, password: &str) -> bool {
        verify_password_async(password.to_string(), self.0.to_string()).await
    }

    /// Work factor embedded in the digest.
    pub fn cost(&self) -> Option<u32> {
        self.0.split('$').nth(2).and_then(|c| c.parse().ok())
    }
}
