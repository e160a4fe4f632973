//! Usage accounting after a successful generation.

use chrono::{DateTime, Utc};
use memory_therapy_core::UsageSnapshot;

use crate::db::UserStore;
use crate::models::UserAccount;

/// Records consumed quota.
///
/// The stored counter is incremented in place and the in-memory account
/// takes the stored value, so overlapping requests and a plan change made
/// by another request are not overwritten. A failed write is logged and
/// swallowed so the user still gets the image.
#[derive(Clone)]
pub struct UsageLedger<S> {
    store: S,
}

impl<S: UserStore> UsageLedger<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Count one generated image against `account`.
    pub async fn record_success(
        &self,
        account: &mut UserAccount,
        now: DateTime<Utc>,
    ) -> UsageSnapshot {
        account.last_image_at = Some(now);

        match self.store.record_usage(&account.id, now).await {
            Ok(images_used) => account.images_used = images_used,
            Err(e) => {
                account.images_used = account.images_used.saturating_add(1);
                tracing::error!(
                    user_id = %account.id,
                    images_used = account.images_used,
                    error = %e,
                    "Failed to persist usage"
                );
            }
        }

        account.usage()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use memory_therapy_core::{Email, PlanTier, UserId};

    use super::*;
    use crate::db::RepositoryError;

    /// One stored usage counter.
    #[derive(Default)]
    struct Counter {
        images_used: Mutex<u32>,
        fail: bool,
    }

    impl Counter {
        fn starting_at(used: u32) -> Self {
            Self {
                images_used: Mutex::new(used),
                fail: false,
            }
        }

        fn stored(&self) -> u32 {
            *self.images_used.lock().expect("lock")
        }
    }

    impl UserStore for Counter {
        async fn find(&self, _id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
            Ok(None)
        }

        async fn create_default(
            &self,
            id: &UserId,
            email: &Email,
            now: DateTime<Utc>,
        ) -> Result<UserAccount, RepositoryError> {
            Ok(UserAccount::with_defaults(id.clone(), email.clone(), now))
        }

        async fn record_usage(
            &self,
            _id: &UserId,
            _at: DateTime<Utc>,
        ) -> Result<u32, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::NotFound);
            }
            let mut used = self.images_used.lock().expect("lock");
            *used += 1;
            Ok(*used)
        }

        async fn set_plan(
            &self,
            _id: &UserId,
            _plan: PlanTier,
            _at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            *self.images_used.lock().expect("lock") = 0;
            Ok(())
        }

        async fn upgrade_free(
            &self,
            id: &UserId,
            plan: PlanTier,
            at: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            self.set_plan(id, plan, at).await?;
            Ok(true)
        }
    }

    fn account(plan: PlanTier, used: u32) -> UserAccount {
        let mut account = UserAccount::with_defaults(
            UserId::new("uid-1").expect("valid"),
            Email::parse("ana@example.com").expect("valid"),
            Utc::now(),
        );
        account.plan = plan;
        account.images_used = used;
        account
    }

    #[tokio::test]
    async fn test_n_successes_add_n() {
        let ledger = UsageLedger::new(Counter::starting_at(40));
        let mut account = account(PlanTier::Premium, 40);

        let mut snapshot = account.usage();
        for _ in 0..5 {
            snapshot = ledger.record_success(&mut account, Utc::now()).await;
        }

        assert_eq!(account.images_used, 45);
        assert_eq!(ledger.store.stored(), 45);
        assert_eq!(snapshot.remaining, Some(55));
        assert!(account.last_image_at.is_some());
    }

    #[tokio::test]
    async fn test_overlapping_requests_both_count() {
        let ledger = UsageLedger::new(Counter::starting_at(5));
        // Two requests loaded the account before either finished
        let mut first = account(PlanTier::Basic, 5);
        let mut second = account(PlanTier::Basic, 5);

        ledger.record_success(&mut first, Utc::now()).await;
        ledger.record_success(&mut second, Utc::now()).await;

        assert_eq!(ledger.store.stored(), 7);
        assert_eq!(second.images_used, 7);
    }

    #[tokio::test]
    async fn test_plan_reset_during_generation_is_kept() {
        let ledger = UsageLedger::new(Counter::starting_at(2));
        let mut in_flight = account(PlanTier::Free, 2);

        // The payment return resets usage while the image is generating
        ledger
            .store
            .set_plan(&in_flight.id, PlanTier::Basic, Utc::now())
            .await
            .expect("set plan");
        ledger.record_success(&mut in_flight, Utc::now()).await;

        assert_eq!(ledger.store.stored(), 1);
        assert_eq!(in_flight.images_used, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let ledger = UsageLedger::new(Counter {
            fail: true,
            ..Counter::default()
        });
        let mut account = account(PlanTier::Basic, 9);

        let snapshot = ledger.record_success(&mut account, Utc::now()).await;

        assert_eq!(account.images_used, 10);
        assert!(snapshot.exhausted);
    }
}
