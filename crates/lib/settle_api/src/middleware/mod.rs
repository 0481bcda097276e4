//! Request middleware and session extractors.

pub mod gatekeeper;
pub mod session;
