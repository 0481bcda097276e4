//! Settle API server binary.
//!
//! Loads configuration (refusing to start without a signing secret), connects
//! to PostgreSQL, runs migrations and serves the API and page gatekeeper.

use clap::Parser;
use settle_api::config::ApiConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "settle_server", about = "Settle API server")]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 3100)]
    port: u16,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/settle"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Do not run embedded migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,settle_api=debug,settle_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("refusing to start: {e}");
            return Err(e.into());
        }
    };
    let bind_addr = format!("{}:{}", args.host, args.port);

    info!(
        %bind_addr,
        production = config.production,
        max_connections = args.max_connections,
        "starting settle_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    if args.skip_migrations {
        info!("skipping database migrations");
    } else {
        info!("running database migrations");
        settle_api::migrate(&pool).await?;
    }

    let state = settle_api::AppState::postgres(pool, config)?;
    let app = settle_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
