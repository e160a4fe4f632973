//! Subscription plan catalogue.
//!
//! The set of tiers is static configuration: each tier carries a display
//! name, a monthly image quota, a monthly price and the feature list shown
//! on the pricing page.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Monthly image allowance of a plan.
///
/// `Unlimited` is a sentinel, not a number: it must never be compared as a
/// finite bound, which is why it is a separate variant instead of `-1` or
/// `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "images")]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    /// Whether `used` images still leave room for one more.
    #[must_use]
    pub const fn permits(self, used: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(limit) => used < limit,
        }
    }

    /// Images left this month, or `None` for unlimited plans.
    #[must_use]
    pub const fn remaining(self, used: u32) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Limited(limit) => Some(limit.saturating_sub(used)),
        }
    }
}

/// Error for an unrecognised plan name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

/// A subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl PlanTier {
    /// Every tier, cheapest first.
    pub const ALL: [Self; 4] = [Self::Free, Self::Basic, Self::Premium, Self::Enterprise];

    /// Stable identifier used in storage, URLs and payment-link keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    /// Human-readable plan name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Premium => "Premium",
            Self::Enterprise => "Enterprise",
        }
    }

    /// Monthly image quota.
    #[must_use]
    pub const fn quota(self) -> Quota {
        match self {
            Self::Free => Quota::Limited(3),
            Self::Basic => Quota::Limited(10),
            Self::Premium => Quota::Limited(100),
            Self::Enterprise => Quota::Unlimited,
        }
    }

    /// Monthly price in USD.
    #[must_use]
    pub const fn monthly_price(self) -> Decimal {
        match self {
            Self::Free => Decimal::ZERO,
            Self::Basic => Decimal::from_parts(999, 0, 0, false, 2),
            Self::Premium => Decimal::from_parts(2499, 0, 0, false, 2),
            Self::Enterprise => Decimal::from_parts(9999, 0, 0, false, 2),
        }
    }

    /// Whether the tier is bought through a payment link.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Feature bullets shown on the pricing page.
    #[must_use]
    pub const fn features(self) -> &'static [&'static str] {
        match self {
            Self::Free => &[
                "3 images per month",
                "Basic AI models",
                "Standard quality",
                "Email support",
            ],
            Self::Basic => &[
                "10 images per month",
                "All AI models",
                "HD quality",
                "Priority support",
                "No watermark",
            ],
            Self::Premium => &[
                "100 images per month",
                "All premium models",
                "4K quality",
                "24/7 support",
                "Private gallery",
                "Unlimited downloads",
            ],
            Self::Enterprise => &[
                "Unlimited images",
                "Custom API",
                "Exclusive models",
                "Dedicated support",
                "Enterprise integration",
                "Advanced analytics",
            ],
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(UnknownPlan(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_quotas() {
        assert_eq!(PlanTier::Free.quota(), Quota::Limited(3));
        assert_eq!(PlanTier::Basic.quota(), Quota::Limited(10));
        assert_eq!(PlanTier::Premium.quota(), Quota::Limited(100));
        assert_eq!(PlanTier::Enterprise.quota(), Quota::Unlimited);
    }

    #[test]
    fn test_prices() {
        assert_eq!(PlanTier::Free.monthly_price().to_string(), "0");
        assert_eq!(PlanTier::Basic.monthly_price().to_string(), "9.99");
        assert_eq!(PlanTier::Premium.monthly_price().to_string(), "24.99");
        assert_eq!(PlanTier::Enterprise.monthly_price().to_string(), "99.99");
    }

    #[test]
    fn test_unlimited_permits_any_count() {
        assert!(Quota::Unlimited.permits(0));
        assert!(Quota::Unlimited.permits(u32::MAX));
        assert_eq!(Quota::Unlimited.remaining(1_000_000), None);
    }

    #[test]
    fn test_limited_remaining_saturates() {
        assert_eq!(Quota::Limited(10).remaining(4), Some(6));
        assert_eq!(Quota::Limited(10).remaining(12), Some(0));
    }

    #[test]
    fn test_round_trip_names() {
        for tier in PlanTier::ALL {
            assert_eq!(tier.as_str().parse::<PlanTier>(), Ok(tier));
        }
        assert_eq!(
            "gold".parse::<PlanTier>(),
            Err(UnknownPlan("gold".to_owned()))
        );
    }

    #[test]
    fn test_only_free_is_unpaid() {
        assert!(!PlanTier::Free.is_paid());
        assert!(PlanTier::Basic.is_paid());
        assert!(PlanTier::Enterprise.is_paid());
    }
}
