//! Route paths.

// JSON API (excluded from the gatekeeper; handlers check their own session).
pub const GET_API_HEALTH: &str = "/api/health";
pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const GET_AUTH_ME: &str = "/api/auth/me";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const POST_AUTH_VERIFY_RESET_CODE: &str = "/api/auth/verify-reset-code";
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/auth/reset-password";
pub const POST_PORTAL_AUTH_LOGIN: &str = "/api/portal/auth/login";
pub const POST_PORTAL_AUTH_LOGOUT: &str = "/api/portal/auth/logout";
pub const GET_PORTAL_AUTH_ME: &str = "/api/portal/auth/me";
pub const POST_PORTAL_AUTH_FORGOT_PASSWORD: &str = "/api/portal/auth/forgot-password";
pub const POST_PORTAL_AUTH_RESET_PASSWORD: &str = "/api/portal/auth/reset-password";
pub const POST_PORTAL_AUTH_CHANGE_PASSWORD: &str = "/api/portal/auth/change-password";

// Pages.
pub const STAFF_LOGIN_PAGE: &str = "/login";
pub const STAFF_DASHBOARD_PAGE: &str = "/dashboard";
pub const PORTAL_LOGIN_PAGE: &str = "/portal/login";
pub const PORTAL_DASHBOARD_PAGE: &str = "/portal/dashboard";
pub const PORTAL_RESET_PASSWORD_PAGE: &str = "/portal/reset-password";
