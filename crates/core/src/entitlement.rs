//! The entitlement gate and the usage snapshot shown next to the form.
//!
//! Both are pure functions of (plan, used). There is no reservation: a
//! caller checks, awaits the providers, then records usage, so two
//! overlapping submissions can both pass the gate.

use serde::Serialize;

use crate::types::{PlanTier, Quota};

/// Remaining count at or below which the UI warns the user.
pub const LOW_REMAINING_THRESHOLD: u32 = 2;

/// Whether a user on `plan` who has used `used` images may start another.
#[must_use]
pub const fn can_generate(plan: PlanTier, used: u32) -> bool {
    plan.quota().permits(used)
}

/// Quota state for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub plan: PlanTier,
    pub used: u32,
    /// `None` for unlimited plans.
    pub limit: Option<u32>,
    /// `None` for unlimited plans.
    pub remaining: Option<u32>,
    /// Share of the quota used, 0-100; `None` for unlimited plans.
    pub percent_used: Option<u8>,
    /// One or two images left.
    pub low: bool,
    /// Nothing left this month.
    pub exhausted: bool,
}

impl UsageSnapshot {
    #[must_use]
    pub fn new(plan: PlanTier, used: u32) -> Self {
        match plan.quota() {
            Quota::Unlimited => Self {
                plan,
                used,
                limit: None,
                remaining: None,
                percent_used: None,
                low: false,
                exhausted: false,
            },
            Quota::Limited(limit) => {
                let remaining = limit.saturating_sub(used);
                let percent = if limit == 0 {
                    100
                } else {
                    (u64::from(used.min(limit)) * 100 / u64::from(limit)).min(100)
                };
                Self {
                    plan,
                    used,
                    limit: Some(limit),
                    remaining: Some(remaining),
                    percent_used: u8::try_from(percent).ok(),
                    low: remaining > 0 && remaining <= LOW_REMAINING_THRESHOLD,
                    exhausted: remaining == 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_finite_plans() {
        for plan in [PlanTier::Free, PlanTier::Basic, PlanTier::Premium] {
            let Quota::Limited(limit) = plan.quota() else {
                panic!("{plan} should be finite");
            };
            for used in 0..limit + 3 {
                assert_eq!(can_generate(plan, used), used < limit, "{plan} used={used}");
            }
        }
    }

    #[test]
    fn test_gate_unlimited_ignores_usage() {
        for used in [0, 1, 10_000, u32::MAX] {
            assert!(can_generate(PlanTier::Enterprise, used));
        }
    }

    #[test]
    fn test_snapshot_counts_down() {
        let snapshot = UsageSnapshot::new(PlanTier::Basic, 4);
        assert_eq!(snapshot.limit, Some(10));
        assert_eq!(snapshot.remaining, Some(6));
        assert_eq!(snapshot.percent_used, Some(40));
        assert!(!snapshot.low);
        assert!(!snapshot.exhausted);
    }

    #[test]
    fn test_snapshot_low_and_exhausted() {
        let low = UsageSnapshot::new(PlanTier::Basic, 8);
        assert!(low.low);
        assert!(!low.exhausted);

        let out = UsageSnapshot::new(PlanTier::Basic, 10);
        assert!(!out.low);
        assert!(out.exhausted);
        assert_eq!(out.remaining, Some(0));
    }

    #[test]
    fn test_snapshot_over_quota_clamps() {
        let snapshot = UsageSnapshot::new(PlanTier::Free, 7);
        assert_eq!(snapshot.remaining, Some(0));
        assert_eq!(snapshot.percent_used, Some(100));
    }

    #[test]
    fn test_snapshot_unlimited_skips_remaining() {
        let snapshot = UsageSnapshot::new(PlanTier::Enterprise, 500);
        assert_eq!(snapshot.remaining, None);
        assert_eq!(snapshot.percent_used, None);
        assert!(!snapshot.low && !snapshot.exhausted);
    }
}
