//! Password-reset secrets: 6-digit codes and opaque link tokens.
//!
//! Both kinds are stored only as SHA-256 digests.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lifetime of an emailed reset code: 15 minutes.
pub const RESET_CODE_TTL_SECS: i64 = 15 * 60;

/// Wrong guesses a pending reset code survives; the last one discards it.
pub const RESET_CODE_MAX_MISSES: i32 = 5;

/// Lifetime of a portal reset link token: 1 hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Length of a portal reset link token.
const RESET_TOKEN_LEN: usize = 64;

/// Generate a uniformly distributed 6-digit code (`100000..=999999`).
pub fn generate_reset_code() -> String {
    rng().random_range(100_000u32..1_000_000).to_string()
}

/// Whether `code` has the shape of a reset code. Used to reject junk early.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Generate a cryptographically random link token (64 alphanumeric chars).
pub fn generate_reset_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Row id for a stored reset token. UUIDv7, so later tokens sort last.
pub fn reset_token_row_id() -> Uuid {
    Uuid::now_v7()
}

/// SHA-256 hex digest used as the storage key for codes and tokens.
pub fn digest_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}
