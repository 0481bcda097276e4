//! Schema migrations for accounts, portal principals and reset secrets.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};

/// Migrations embedded from `migrations/` at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
