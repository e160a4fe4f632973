//! User account domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use memory_therapy_core::{Email, PlanTier, SubscriptionStatus, UsageSnapshot, UserId};

/// A user's plan and usage, as stored in the `users` table.
///
/// Handlers load a copy per request and write changes straight back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Email,
    pub plan: PlanTier,
    /// Images generated in the current period.
    pub images_used: u32,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub last_image_at: Option<DateTime<Utc>>,
    pub plan_updated_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// A first-seen account: free plan, nothing used, active.
    #[must_use]
    pub fn with_defaults(id: UserId, email: Email, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            plan: PlanTier::Free,
            images_used: 0,
            subscription_status: SubscriptionStatus::Active,
            created_at: now,
            last_image_at: None,
            plan_updated_at: None,
        }
    }

    /// Quota state for the usage meter.
    #[must_use]
    pub fn usage(&self) -> UsageSnapshot {
        UsageSnapshot::new(self.plan, self.images_used)
    }

    /// Whether another image may be generated right now.
    #[must_use]
    pub const fn can_generate(&self) -> bool {
        memory_therapy_core::can_generate(self.plan, self.images_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> UserAccount {
        UserAccount::with_defaults(
            UserId::new("uid-1").expect("valid"),
            Email::parse("ana@example.com").expect("valid"),
            Utc::now(),
        )
    }

    #[test]
    fn test_defaults() {
        let account = account();
        assert_eq!(account.plan, PlanTier::Free);
        assert_eq!(account.images_used, 0);
        assert_eq!(account.subscription_status, SubscriptionStatus::Active);
        assert!(account.last_image_at.is_none());
    }

    #[test]
    fn test_usage_follows_plan() {
        let mut account = account();
        account.images_used = 3;
        assert!(!account.can_generate());
        assert!(account.usage().exhausted);

        account.plan = PlanTier::Basic;
        assert!(account.can_generate());
        assert_eq!(account.usage().remaining, Some(7));
    }
}
