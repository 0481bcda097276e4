//! # settle_api
//!
//! HTTP API library for Settle: staff and portal sessions, the page
//! gatekeeper, and the password reset workflows.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use settle_core::auth::AuthError;
use settle_core::auth::password::DecoyDigest;
use settle_core::auth::queries::PgCredentialStore;
use settle_core::auth::store::CredentialStore;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, pages, portal_auth};
use crate::services::notify::{LogNotifier, ResetNotifier};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Principals and reset secrets.
    pub store: Arc<dyn CredentialStore>,
    /// Delivery channel for reset codes and links.
    pub notifier: Arc<dyn ResetNotifier>,
    /// API configuration.
    pub config: ApiConfig,
    /// Verified on login misses; hashed at the configured cost.
    pub decoy: DecoyDigest,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn ResetNotifier>,
        config: ApiConfig,
    ) -> Result<Self, AuthError> {
        let decoy = DecoyDigest::new(config.bcrypt_cost)?;
        Ok(Self {
            store,
            notifier,
            config,
            decoy,
        })
    }

    /// State backed by PostgreSQL with log-only notifications.
    pub fn postgres(pool: PgPool, config: ApiConfig) -> Result<Self, AuthError> {
        Self::new(
            Arc::new(PgCredentialStore::new(pool)),
            Arc::new(LogNotifier),
            config,
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `settle_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    settle_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes, the page gatekeeper and shared state.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(routes::GET_API_HEALTH, get(health::health_handler))
        // Staff
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(auth::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_VERIFY_RESET_CODE,
            post(auth::verify_reset_code_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        )
        // Portal
        .route(routes::POST_PORTAL_AUTH_LOGIN, post(portal_auth::login_handler))
        .route(
            routes::POST_PORTAL_AUTH_LOGOUT,
            post(portal_auth::logout_handler),
        )
        .route(routes::GET_PORTAL_AUTH_ME, get(portal_auth::me_handler))
        .route(
            routes::POST_PORTAL_AUTH_FORGOT_PASSWORD,
            post(portal_auth::forgot_password_handler),
        )
        .route(
            routes::POST_PORTAL_AUTH_RESET_PASSWORD,
            post(portal_auth::reset_password_handler),
        )
        .route(
            routes::POST_PORTAL_AUTH_CHANGE_PASSWORD,
            post(portal_auth::change_password_handler),
        );

    Router::new()
        .merge(api)
        .fallback(pages::page_shell)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::gatekeeper::gatekeeper,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
