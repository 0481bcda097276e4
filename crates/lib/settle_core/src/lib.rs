//! # settle_core
//!
//! Core authentication domain logic for Settle: principals, password hashing,
//! session token codec, reset secrets and the credential store.

pub mod auth;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
