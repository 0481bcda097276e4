//! In-memory credential store.
//!
//! Mirrors `PgCredentialStore` semantics, including atomic consumption of reset
//! secrets: every check-and-write happens under one lock acquisition.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{PortalAgent, PortalCustomer, PortalSubject, Role, StaffUser};

#[derive(Debug, Clone)]
struct ResetCodeEntry {
    code_hash: String,
    expires_at: DateTime<Utc>,
    failed_attempts: i32,
}

#[derive(Debug, Clone)]
struct ResetTokenEntry {
    subject: PortalSubject,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<StaffUser>,
    agents: Vec<PortalAgent>,
    /// user id → customer profile id
    customer_profiles: HashMap<i64, i64>,
    reset_codes: HashMap<String, ResetCodeEntry>,
    reset_tokens: Vec<ResetTokenEntry>,
}

impl MemoryState {
    fn active_user_mut(&mut self, user_id: i64) -> Option<&mut StaffUser> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id && u.is_active)
    }

    fn active_agent_mut(&mut self, agent_id: i64) -> Option<&mut PortalAgent> {
        self.agents
            .iter_mut()
            .find(|a| a.id == agent_id && a.is_active)
    }

    fn set_subject_password(&mut self, subject: PortalSubject, hash: &str) -> bool {
        match subject {
            PortalSubject::Agent(id) => match self.active_agent_mut(id) {
                Some(agent) => {
                    agent.portal_password_hash = Some(hash.to_string());
                    true
                }
                None => false,
            },
            PortalSubject::Customer(id) => match self.active_user_mut(id) {
                Some(user) if user.role == Role::Customer => {
                    user.password_hash = hash.to_string();
                    true
                }
                _ => false,
            },
        }
    }
}

/// `CredentialStore` held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Internal("credential store lock poisoned".into()))
    }

    /// Add or replace a `users` row.
    pub fn insert_user(&self, user: StaffUser) -> Result<(), AuthError> {
        let mut state = self.state()?;
        state.users.retain(|u| u.id != user.id);
        state.users.push(user);
        Ok(())
    }

    /// Link a customer profile to a user.
    pub fn insert_customer_profile(
        &self,
        user_id: i64,
        customer_id: i64,
    ) -> Result<(), AuthError> {
        self.state()?.customer_profiles.insert(user_id, customer_id);
        Ok(())
    }

    /// Add or replace an `agents` row.
    pub fn insert_agent(&self, agent: PortalAgent) -> Result<(), AuthError> {
        let mut state = self.state()?;
        state.agents.retain(|a| a.id != agent.id);
        state.agents.push(agent);
        Ok(())
    }

    /// Number of pending reset codes.
    pub fn reset_code_count(&self) -> Result<usize, AuthError> {
        Ok(self.state()?.reset_codes.len())
    }

    /// Number of portal reset tokens, used or not.
    pub fn reset_token_count(&self) -> Result<usize, AuthError> {
        Ok(self.state()?.reset_tokens.len())
    }

    /// Stored hash of a user's password.
    pub fn user_password_hash(&self, user_id: i64) -> Result<Option<String>, AuthError> {
        Ok(self
            .state()?
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.password_hash.clone()))
    }

    /// Stored hash of an agent's portal password.
    pub fn agent_portal_password_hash(&self, agent_id: i64) -> Result<Option<String>, AuthError> {
        Ok(self
            .state()?
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .and_then(|a| a.portal_password_hash.clone()))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn ping(&self) -> Result<(), AuthError> {
        self.state().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StaffUser>, AuthError> {
        Ok(self
            .state()?
            .users
            .iter()
            .find(|u| u.email == email && u.is_active)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<StaffUser>, AuthError> {
        Ok(self
            .state()?
            .users
            .iter()
            .find(|u| u.id == user_id && u.is_active)
            .cloned())
    }

    async fn find_portal_agent_by_email(
        &self,
        portal_email: &str,
    ) -> Result<Option<PortalAgent>, AuthError> {
        Ok(self
            .state()?
            .agents
            .iter()
            .find(|a| a.portal_email == portal_email && a.is_portal_eligible())
            .cloned())
    }

    async fn find_portal_agent_by_id(
        &self,
        agent_id: i64,
    ) -> Result<Option<PortalAgent>, AuthError> {
        Ok(self
            .state()?
            .agents
            .iter()
            .find(|a| a.id == agent_id && a.is_portal_eligible())
            .cloned())
    }

    async fn find_portal_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<PortalCustomer>, AuthError> {
        let state = self.state()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email && u.is_active && u.role == Role::Customer)
            .map(|u| PortalCustomer {
                id: state.customer_profiles.get(&u.id).copied().unwrap_or(u.id),
                user_id: u.id,
                email: u.email.clone(),
                name: u.name.clone(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn set_user_password(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let mut state = self.state()?;
        Ok(match state.active_user_mut(user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn set_agent_portal_password(
        &self,
        agent_id: i64,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let mut state = self.state()?;
        Ok(match state.active_agent_mut(agent_id) {
            Some(agent) => {
                agent.portal_password_hash = Some(password_hash.to_string());
                true
            }
            None => false,
        })
    }

    async fn upsert_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.state()?.reset_codes.insert(
            email.to_string(),
            ResetCodeEntry {
                code_hash: code_hash.to_string(),
                expires_at,
                failed_attempts: 0,
            },
        );
        Ok(())
    }

    async fn reset_code_is_valid(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        Ok(self
            .state()?
            .reset_codes
            .get(email)
            .is_some_and(|entry| entry.code_hash == code_hash && entry.expires_at > now))
    }

    async fn consume_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut state = self.state()?;
        let matches = state
            .reset_codes
            .get(email)
            .is_some_and(|entry| entry.code_hash == code_hash && entry.expires_at > now);
        if !matches {
            return Ok(false);
        }
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.email == email && u.is_active)
        else {
            return Ok(false);
        };
        user.password_hash = new_password_hash.to_string();
        state.reset_codes.remove(email);
        Ok(true)
    }

    async fn record_reset_code_miss(
        &self,
        email: &str,
        max_misses: i32,
    ) -> Result<bool, AuthError> {
        let mut state = self.state()?;
        let Some(entry) = state.reset_codes.get_mut(email) else {
            return Ok(false);
        };
        entry.failed_attempts += 1;
        if entry.failed_attempts < max_misses {
            return Ok(false);
        }
        state.reset_codes.remove(email);
        Ok(true)
    }

    async fn insert_portal_reset_token(
        &self,
        subject: PortalSubject,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut state = self.state()?;
        for entry in state
            .reset_tokens
            .iter_mut()
            .filter(|t| t.subject == subject && !t.used)
        {
            entry.used = true;
        }
        state.reset_tokens.push(ResetTokenEntry {
            subject,
            token_hash: token_hash.to_string(),
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn consume_portal_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PortalSubject>, AuthError> {
        let mut state = self.state()?;
        let Some(index) = state
            .reset_tokens
            .iter()
            .position(|t| t.token_hash == token_hash && !t.used && t.expires_at > now)
        else {
            return Ok(None);
        };
        let subject = state.reset_tokens[index].subject;
        if !state.set_subject_password(subject, new_password_hash) {
            return Ok(None);
        }
        state.reset_tokens[index].used = true;
        Ok(Some(subject))
    }
}
