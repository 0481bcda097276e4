//! Business services behind the handlers.

pub mod auth;
pub mod cookies;
pub mod notify;
pub mod reset;
