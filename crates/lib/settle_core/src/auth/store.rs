//! Credential store contract.
//!
//! All coordination between concurrent requests happens here: consumption of
//! reset codes and tokens is decided by the store's conditional write, never
//! by an earlier read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{PortalAgent, PortalCustomer, PortalSubject, StaffUser};

/// Persisted principals and reset secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), AuthError>;

    /// Active `users` row with this email, any role.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<StaffUser>, AuthError>;

    /// Active `users` row by id.
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<StaffUser>, AuthError>;

    /// Agent whose `portal_email` matches and who may use the portal
    /// (access enabled, active, password set).
    async fn find_portal_agent_by_email(
        &self,
        portal_email: &str,
    ) -> Result<Option<PortalAgent>, AuthError>;

    /// Portal-eligible agent by id.
    async fn find_portal_agent_by_id(&self, agent_id: i64)
    -> Result<Option<PortalAgent>, AuthError>;

    /// Active account with role exactly `customer`.
    async fn find_portal_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PortalCustomer>, AuthError>;

    /// Replace `users.password_hash`. Returns whether a row was updated.
    async fn set_user_password(&self, user_id: i64, password_hash: &str)
    -> Result<bool, AuthError>;

    /// Replace `agents.portal_password_hash`. Returns whether a row was updated.
    async fn set_agent_portal_password(
        &self,
        agent_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError>;

    /// Store a reset code for `email`, replacing any pending one and its
    /// miss count.
    async fn upsert_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Whether a matching, unexpired code exists. Does not consume it.
    async fn reset_code_is_valid(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Atomically consume a matching, unexpired code and set the password of
    /// the active account with that email. Returns `false` if nothing was
    /// consumed; in that case no password changes.
    async fn consume_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Count a wrong guess against the pending code for `email`, discarding
    /// the code once `max_misses` guesses have failed. Returns whether it was
    /// discarded.
    async fn record_reset_code_miss(&self, email: &str, max_misses: i32)
    -> Result<bool, AuthError>;

    /// Store a new portal reset token, superseding earlier unused tokens of
    /// the same subject.
    async fn insert_portal_reset_token(
        &self,
        subject: PortalSubject,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Atomically mark a matching, unused, unexpired token as used and set
    /// the subject's password. Returns the subject, or `None` if the token
    /// was not consumed.
    async fn consume_portal_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PortalSubject>, AuthError>;
}
