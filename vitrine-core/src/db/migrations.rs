/// Database migration runner
///
/// Migrations live in `migrations/` at the crate root and are embedded at
/// compile time, so the binary carries its own schema.
use sqlx::PgPool;
use tracing::{info, warn};

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply; applied migrations are
/// not rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("database migrations up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "migration failed");
            Err(e)
        }
    }
}
