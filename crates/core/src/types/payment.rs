//! State carried across the external payment redirect.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanTier;

/// Query parameter value the payment provider appends on success
/// (`?payment=success`).
pub const PAYMENT_SUCCESS_MARKER: &str = "success";

/// A plan upgrade recorded right before redirecting to the payment page.
///
/// Consumed when the user comes back, or discarded once it is older than
/// the validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlanChange {
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
}

impl PendingPlanChange {
    /// Default validity window, in seconds.
    pub const VALIDITY_SECS: i64 = 60 * 60;

    /// The default validity window as a duration.
    #[must_use]
    pub fn validity() -> Duration {
        Duration::seconds(Self::VALIDITY_SECS)
    }

    #[must_use]
    pub const fn new(plan: PlanTier, created_at: DateTime<Utc>) -> Self {
        Self { plan, created_at }
    }

    /// Whether the record is older than `window` at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.created_at) > window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_change_is_valid() {
        let now = Utc::now();
        let change = PendingPlanChange::new(PlanTier::Basic, now - Duration::minutes(59));
        assert!(!change.is_expired(now, PendingPlanChange::validity()));
    }

    #[test]
    fn test_change_older_than_an_hour_expires() {
        let now = Utc::now();
        let change = PendingPlanChange::new(PlanTier::Premium, now - Duration::minutes(61));
        assert!(change.is_expired(now, PendingPlanChange::validity()));
    }

    #[test]
    fn test_serde_shape() {
        let change = PendingPlanChange::new(PlanTier::Basic, Utc::now());
        let json = serde_json::to_value(change).expect("serialize");
        assert_eq!(json["plan"], "basic");
        let back: PendingPlanChange = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, change);
    }
}
