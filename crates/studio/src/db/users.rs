//! User repository for database operations.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use memory_therapy_core::{Email, PlanTier, SubscriptionStatus, UserId};

use super::{RepositoryError, UserStore};
use crate::models::UserAccount;

const USER_COLUMNS: &str = "id, email, plan, images_used, subscription_status, \
                            created_at, last_image_at, plan_updated_at";

/// Raw `users` row.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    plan: String,
    images_used: i32,
    subscription_status: String,
    created_at: DateTime<Utc>,
    last_image_at: Option<DateTime<Utc>>,
    plan_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!("invalid {what} in database: {e}"))
        };

        Ok(Self {
            id: UserId::new(row.id).map_err(|e| corrupt("user id", &e))?,
            email: Email::parse(&row.email).map_err(|e| corrupt("email", &e))?,
            plan: row.plan.parse::<PlanTier>().map_err(|e| corrupt("plan", &e))?,
            images_used: u32::try_from(row.images_used)
                .map_err(|e| corrupt("images_used", &e))?,
            subscription_status: row
                .subscription_status
                .parse::<SubscriptionStatus>()
                .map_err(|e| corrupt("subscription status", &e))?,
            created_at: row.created_at,
            last_image_at: row.last_image_at,
            plan_updated_at: row.plan_updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row does not decode.
    pub async fn get_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(UserAccount::try_from).transpose()
    }

    /// Insert a user with defaults; an existing row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_default(
        &self,
        id: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, RepositoryError> {
        let defaults = UserAccount::with_defaults(id.clone(), email.clone(), now);

        let inserted = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, plan, images_used, subscription_status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO NOTHING
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(email.as_str())
        .bind(defaults.plan.as_str())
        .bind(0_i32)
        .bind(defaults.subscription_status.as_str())
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        match inserted {
            Some(row) => UserAccount::try_from(row),
            // Another request created it first
            None => self.get_by_id(id).await?.ok_or(RepositoryError::NotFound),
        }
    }

    /// Increment the usage counter in place and stamp the latest image time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row matched.
    pub async fn increment_usage(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let images_used: Option<i32> = sqlx::query_scalar(
            "UPDATE users SET images_used = images_used + 1, last_image_at = $2
             WHERE id = $1
             RETURNING images_used",
        )
        .bind(id.as_str())
        .bind(at)
        .fetch_optional(self.pool)
        .await?;

        let images_used = images_used.ok_or(RepositoryError::NotFound)?;
        u32::try_from(images_used)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid images_used: {e}")))
    }

    /// Change plan, reset usage and mark the subscription active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row matched.
    pub async fn update_plan(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users
             SET plan = $2, images_used = 0, subscription_status = $3, plan_updated_at = $4
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(plan.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Like [`Self::update_plan`], but only for an account still on the free
    /// tier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_plan_from_free(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users
             SET plan = $2, images_used = 0, subscription_status = $3, plan_updated_at = $4
             WHERE id = $1 AND plan = $5",
        )
        .bind(id.as_str())
        .bind(plan.as_str())
        .bind(SubscriptionStatus::Active.as_str())
        .bind(at)
        .bind(PlanTier::Free.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl UserStore for UserRepository<'_> {
    async fn find(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        self.get_by_id(id).await
    }

    async fn create_default(
        &self,
        id: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, RepositoryError> {
        self.insert_default(id, email, now).await
    }

    async fn record_usage(&self, id: &UserId, at: DateTime<Utc>) -> Result<u32, RepositoryError> {
        self.increment_usage(id, at).await
    }

    async fn set_plan(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.update_plan(id, plan, at).await
    }

    async fn upgrade_free(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.update_plan_from_free(id, plan, at).await
    }
}
