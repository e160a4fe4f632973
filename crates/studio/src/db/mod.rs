//! Database operations for the studio `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - plan tier and usage counter per identity-provider user
//! - `tower_sessions.session` - browser sessions (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/studio/migrations/` and run via:
//! ```bash
//! cargo run -p memory-therapy-cli -- migrate
//! ```

pub mod users;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use memory_therapy_core::{Email, PlanTier, UserId};

use crate::models::UserAccount;

pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Read/write access to user accounts.
///
/// Implemented by [`UserRepository`] for `PostgreSQL`; the workflow services
/// only see this trait.
pub trait UserStore: Send + Sync {
    /// Load an account by identity-provider id.
    fn find(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<UserAccount>, RepositoryError>> + Send;

    /// Create an account with defaults, or return the existing one.
    fn create_default(
        &self,
        id: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<UserAccount, RepositoryError>> + Send;

    /// Count one more image against the stored counter and return the new
    /// count. Increments happen in the store, never from a caller's copy.
    fn record_usage(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u32, RepositoryError>> + Send;

    /// Move an account to `plan`, resetting its usage counter.
    fn set_plan(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Move an account to `plan` only while it is still on the free tier.
    ///
    /// Returns `false` when the account has meanwhile moved to a paid plan.
    fn upgrade_free(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

impl<S: UserStore> UserStore for &S {
    fn find(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<UserAccount>, RepositoryError>> + Send {
        (**self).find(id)
    }

    fn create_default(
        &self,
        id: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<UserAccount, RepositoryError>> + Send {
        (**self).create_default(id, email, now)
    }

    fn record_usage(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u32, RepositoryError>> + Send {
        (**self).record_usage(id, at)
    }

    fn set_plan(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set_plan(id, plan, at)
    }

    fn upgrade_free(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send {
        (**self).upgrade_free(id, plan, at)
    }
}

/// Load an account, creating it with defaults on first sight.
///
/// # Errors
///
/// Returns `RepositoryError` if the store cannot be read or written.
pub async fn load_or_create<S: UserStore>(
    store: &S,
    id: &UserId,
    email: &Email,
) -> Result<UserAccount, RepositoryError> {
    if let Some(account) = store.find(id).await? {
        return Ok(account);
    }
    tracing::info!(user_id = %id, "Creating user record with defaults");
    store.create_default(id, email, Utc::now()).await
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
