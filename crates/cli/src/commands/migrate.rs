//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mt-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STUDIO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Studio migrations live in `crates/studio/migrations/`. The session table
//! is created by the session store's own migration.

use memory_therapy_studio::db;
use secrecy::SecretString;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn database_url() -> Result<SecretString, MigrationError> {
    std::env::var("STUDIO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("STUDIO_DATABASE_URL"))
}

/// Run the studio migrations and the session store migration.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the database is
/// unreachable or a migration fails.
pub async fn studio() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    tracing::info!("Connecting to studio database...");
    let pool = db::create_pool(&database_url()?).await?;

    tracing::info!("Running studio migrations...");
    sqlx::migrate!("../studio/migrations").run(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Studio migrations complete!");
    Ok(())
}
