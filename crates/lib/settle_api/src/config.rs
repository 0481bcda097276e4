//! API server configuration.

use std::fmt;

use settle_core::auth::password::{DEFAULT_COST, MAX_CONFIGURED_COST, MIN_CONFIGURED_COST};
use thiserror::Error;

/// Shortest signing secret accepted at startup.
pub const MIN_SECRET_LEN: usize = 32;

/// Startup configuration errors. The server refuses to start on any of them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set")]
    MissingSecret,

    #[error("JWT_SECRET must be at least {min} characters (got {0})", min = MIN_SECRET_LEN)]
    WeakSecret(usize),

    #[error(
        "BCRYPT_COST must be between {min} and {max} (got {0})",
        min = MIN_CONFIGURED_COST,
        max = MAX_CONFIGURED_COST
    )]
    InvalidCost(String),

    #[error("PUBLIC_BASE_URL is not a valid URL: {0}")]
    InvalidBaseUrl(String),
}

/// Configuration for the API server. The listener address and database URL
/// belong to the server binary's command line.
#[derive(Clone)]
pub struct ApiConfig {
    /// Session token signing secret. Read-only after startup.
    pub jwt_secret: String,
    /// Production mode: `Secure` cookies, no reset-secret echo.
    pub production: bool,
    /// Origin used to build portal reset links.
    pub public_base_url: String,
    /// bcrypt cost for new password hashes.
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable          | Default                             |
    /// |-------------------|-------------------------------------|
    /// | `JWT_SECRET`      | required, ≥ 32 chars                |
    /// | `APP_ENV`         | `development`                       |
    /// | `PUBLIC_BASE_URL` | `http://localhost:3000`             |
    /// | `BCRYPT_COST`     | `10`                                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = require_secret(lookup("JWT_SECRET"))?;

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            None => DEFAULT_COST,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(cost) if (MIN_CONFIGURED_COST..=MAX_CONFIGURED_COST).contains(&cost) => cost,
                _ => return Err(ConfigError::InvalidCost(raw)),
            },
        };

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:3000".into());
        url::Url::parse(&public_base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{public_base_url}: {e}")))?;

        Ok(Self {
            jwt_secret,
            production: lookup("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            public_base_url,
            bcrypt_cost,
        })
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("jwt_secret", &"<redacted>")
            .field("production", &self.production)
            .field("public_base_url", &self.public_base_url)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn require_secret(value: Option<String>) -> Result<String, ConfigError> {
    let secret = value.map(|s| s.trim().to_string()).unwrap_or_default();
    if secret.is_empty() {
        return Err(ConfigError::MissingSecret);
    }
    let len = secret.chars().count();
    if len < MIN_SECRET_LEN {
        return Err(ConfigError::WeakSecret(len));
    }
    Ok(secret)
}
