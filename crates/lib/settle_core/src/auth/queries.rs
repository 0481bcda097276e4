//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::secrets::reset_token_row_id;
use super::store::CredentialStore;
use crate::models::auth::{PortalAgent, PortalCustomer, PortalSubject, StaffUser};

type UserRow = (i64, String, Option<String>, String, String, bool);
type AgentRow = (i64, Option<i64>, Option<String>, String, Option<String>, bool, bool);

const USER_COLUMNS: &str = "id, email, name, password_hash, role, is_active";
const AGENT_COLUMNS: &str =
    "id, user_id, name, portal_email, portal_password_hash, portal_access_enabled, is_active";
const AGENT_ELIGIBLE: &str = "portal_access_enabled = TRUE \
     AND is_active = TRUE \
     AND portal_password_hash IS NOT NULL";

fn user_from_row(row: UserRow) -> Result<StaffUser, AuthError> {
    let (id, email, name, password_hash, role, is_active) = row;
    Ok(StaffUser {
        id,
        email,
        name,
        password_hash,
        role: role.parse()?,
        is_active,
    })
}

fn agent_from_row(row: AgentRow) -> PortalAgent {
    let (id, user_id, name, portal_email, portal_password_hash, portal_access_enabled, is_active) =
        row;
    PortalAgent {
        id,
        user_id,
        name,
        portal_email,
        portal_password_hash,
        portal_access_enabled,
        is_active,
    }
}

/// `CredentialStore` backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StaffUser>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = TRUE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<StaffUser>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_portal_agent_by_email(
        &self,
        portal_email: &str,
    ) -> Result<Option<PortalAgent>, AuthError> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE portal_email = $1 AND {AGENT_ELIGIBLE}"
        ))
        .bind(portal_email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(agent_from_row))
    }

    async fn find_portal_agent_by_id(
        &self,
        agent_id: i64,
    ) -> Result<Option<PortalAgent>, AuthError> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1 AND {AGENT_ELIGIBLE}"
        ))
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(agent_from_row))
    }

    async fn find_portal_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PortalCustomer>, AuthError> {
        let row = sqlx::query_as::<_, (i64, i64, String, Option<String>, String)>(
            "SELECT COALESCE(c.id, u.id), u.id, u.email, u.name, u.password_hash \
             FROM users u \
             LEFT JOIN customers c ON c.user_id = u.id \
             WHERE u.email = $1 AND u.is_active = TRUE AND u.role = 'customer'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, user_id, email, name, password_hash)| PortalCustomer {
            id,
            user_id,
            email,
            name,
            password_hash,
        }))
    }

    async fn set_user_password(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() \
             WHERE id = $2 AND is_active = TRUE",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_agent_portal_password(
        &self,
        agent_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE agents SET portal_password_hash = $1, updated_at = now() \
             WHERE id = $2 AND is_active = TRUE",
        )
        .bind(password_hash)
        .bind(agent_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO password_reset_codes (email, code_hash, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO UPDATE \
             SET code_hash = EXCLUDED.code_hash, \
                 expires_at = EXCLUDED.expires_at, \
                 failed_attempts = 0, \
                 created_at = now()",
        )
        .bind(email)
        .bind(code_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_code_is_valid(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let valid = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM password_reset_codes \
             WHERE email = $1 AND code_hash = $2 AND expires_at > $3)",
        )
        .bind(email)
        .bind(code_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(valid)
    }

    async fn consume_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by DELETE serializes concurrent consumers.
        let consumed = sqlx::query_scalar::<_, String>(
            "DELETE FROM password_reset_codes \
             WHERE email = $1 AND code_hash = $2 AND expires_at > $3 \
             RETURNING email",
        )
        .bind(email)
        .bind(code_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        let updated = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() \
             WHERE email = $2 AND is_active = TRUE",
        )
        .bind(new_password_hash)
        .bind(email)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn record_reset_code_miss(
        &self,
        email: &str,
        max_misses: i32,
    ) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        let misses = sqlx::query_scalar::<_, i32>(
            "UPDATE password_reset_codes SET failed_attempts = failed_attempts + 1 \
             WHERE email = $1 \
             RETURNING failed_attempts",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let discarded = match misses {
            Some(n) if n >= max_misses => {
                sqlx::query("DELETE FROM password_reset_codes WHERE email = $1")
                    .bind(email)
                    .execute(&mut *tx)
                    .await?;
                true
            }
            _ => false,
        };

        tx.commit().await?;
        Ok(discarded)
    }

    async fn insert_portal_reset_token(
        &self,
        subject: PortalSubject,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE portal_reset_tokens SET used = TRUE, used_at = $3 \
             WHERE subject_kind = $1 AND subject_id = $2 AND used = FALSE",
        )
        .bind(subject.kind())
        .bind(subject.id())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO portal_reset_tokens \
             (id, subject_kind, subject_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(reset_token_row_id())
        .bind(subject.kind())
        .bind(subject.id())
        .bind(token_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn consume_portal_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PortalSubject>, AuthError> {
        let mut tx = self.pool.begin().await?;

        // Guarded by `used = FALSE`: of two concurrent consumers only one
        // sees an affected row.
        let row = sqlx::query_as::<_, (String, i64)>(
            "UPDATE portal_reset_tokens SET used = TRUE, used_at = $2 \
             WHERE token_hash = $1 AND used = FALSE AND expires_at > $2 \
             RETURNING subject_kind, subject_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((kind, id)) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let subject = PortalSubject::from_parts(&kind, id)?;

        let sql = match subject {
            PortalSubject::Agent(_) => {
                "UPDATE agents SET portal_password_hash = $1, updated_at = now() \
                 WHERE id = $2 AND is_active = TRUE"
            }
            PortalSubject::Customer(_) => {
                "UPDATE users SET password_hash = $1, updated_at = now() \
                 WHERE id = $2 AND is_active = TRUE AND role = 'customer'"
            }
        };
        let updated = sqlx::query(sql)
            .bind(new_password_hash)
            .bind(subject.id())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(subject))
    }
}
