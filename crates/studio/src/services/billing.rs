//! Payment links and the purchase lookup.
//!
//! Checkout is a redirect to a static payment link per paid plan; the
//! studio records the intended plan in the session first (see
//! [`super::reconciler`]). The optional lookup asks Stripe whether an email
//! has a completed checkout, for browsers that never came back from the
//! payment page.

use std::future::Future;

use chrono::{DateTime, Utc};
use memory_therapy_core::{Email, PendingPlanChange, PlanTier, UserId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::BillingConfig;

const STRIPE_CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";
const LOOKUP_PAGE_SIZE: &str = "10";

/// Errors from checkout and purchase lookups.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Only paid plans can be bought.
    #[error("the {0} plan cannot be purchased")]
    NotPurchasable(PlanTier),

    /// The account is already on the requested plan.
    #[error("already on the {0} plan")]
    AlreadyOnPlan(PlanTier),

    /// Paid plans only change through a new payment.
    #[error("plan downgrades are not available")]
    DowngradeUnavailable,

    /// No payment link is configured for the plan.
    #[error("no payment link configured for the {0} plan")]
    NoPaymentLink(PlanTier),

    #[error("invalid payment link: {0}")]
    InvalidLink(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

/// A prepared redirect to the payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub url: Url,
    /// Record to save in the session before redirecting.
    pub pending: PendingPlanChange,
}

/// Prepare the payment redirect for `target`.
///
/// # Errors
///
/// Returns `NotPurchasable` for the free plan, `AlreadyOnPlan` when nothing
/// would change, `DowngradeUnavailable` for a cheaper plan and
/// `NoPaymentLink` when the plan has no configured link.
pub fn start_checkout(
    config: &BillingConfig,
    current: PlanTier,
    target: PlanTier,
    user_id: &UserId,
    email: &Email,
    now: DateTime<Utc>,
) -> Result<Checkout, BillingError> {
    if !target.is_paid() {
        return Err(BillingError::NotPurchasable(target));
    }
    if current == target {
        return Err(BillingError::AlreadyOnPlan(target));
    }
    if target.monthly_price() < current.monthly_price() {
        return Err(BillingError::DowngradeUnavailable);
    }
    let link = config
        .link_for(target)
        .ok_or(BillingError::NoPaymentLink(target))?;

    Ok(Checkout {
        url: checkout_url(link, email, user_id)?,
        pending: PendingPlanChange::new(target, now),
    })
}

/// The payment link with the customer's email and our user id attached.
///
/// # Errors
///
/// Returns `InvalidLink` if the configured link is not a URL.
pub fn checkout_url(link: &str, email: &Email, user_id: &UserId) -> Result<Url, BillingError> {
    let mut url = Url::parse(link)?;
    url.query_pairs_mut()
        .append_pair("prefilled_email", email.as_str())
        .append_pair("client_reference_id", user_id.as_str());
    Ok(url)
}

/// The paid plan whose monthly price is `cents`.
#[must_use]
pub fn plan_for_amount(cents: i64) -> Option<PlanTier> {
    PlanTier::ALL.into_iter().filter(|p| p.is_paid()).find(|p| {
        (p.monthly_price() * Decimal::ONE_HUNDRED)
            .to_i64()
            .is_some_and(|price| price == cents)
    })
}

/// Looks up completed purchases with the payment provider.
pub trait PaymentLookup: Send + Sync {
    /// The plan bought by `email`, if a completed purchase exists.
    fn completed_purchase(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<PlanTier>, BillingError>> + Send;
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionList {
    #[serde(default)]
    data: Vec<CheckoutSession>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    amount_total: Option<i64>,
    #[serde(default)]
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

/// Stripe Checkout Sessions lookup.
#[derive(Clone)]
pub struct StripeLookup {
    client: reqwest::Client,
    secret_key: SecretString,
}

impl StripeLookup {
    /// Build a lookup if `STRIPE_SECRET_KEY` is configured.
    #[must_use]
    pub fn from_config(config: &BillingConfig) -> Option<Self> {
        config.stripe_secret_key.as_ref().map(|key| Self {
            client: reqwest::Client::new(),
            secret_key: key.clone(),
        })
    }
}

impl PaymentLookup for StripeLookup {
    #[instrument(skip_all, fields(email = %email))]
    async fn completed_purchase(&self, email: &Email) -> Result<Option<PlanTier>, BillingError> {
        let url = Url::parse_with_params(
            STRIPE_CHECKOUT_SESSIONS_URL,
            &[
                ("status", "complete"),
                ("customer_details[email]", email.as_str()),
                ("limit", LOOKUP_PAGE_SIZE),
            ],
        )?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sessions: CheckoutSessionList = response.json().await?;
        Ok(newest_paid_plan(&sessions))
    }
}

/// Stripe lists newest first; the first paid session that matches a plan wins.
fn newest_paid_plan(sessions: &CheckoutSessionList) -> Option<PlanTier> {
    sessions
        .data
        .iter()
        .filter(|s| s.payment_status.as_deref().is_none_or(|p| p == "paid"))
        .find_map(|s| s.amount_total.and_then(plan_for_amount))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> BillingConfig {
        BillingConfig {
            basic_link: Some("https://buy.stripe.com/test_basic".to_string()),
            premium_link: Some("https://buy.stripe.com/test_premium?locale=es".to_string()),
            enterprise_link: None,
            stripe_secret_key: None,
            return_window: Duration::from_secs(3600),
            auth_wait: Duration::from_secs(30),
            check_interval: Duration::from_secs(86_400),
        }
    }

    fn ids() -> (UserId, Email) {
        (
            UserId::new("uid-1").expect("valid"),
            Email::parse("ana+test@example.com").expect("valid"),
        )
    }

    #[test]
    fn test_checkout_url_carries_email_and_reference() {
        let (id, email) = ids();
        let url = checkout_url("https://buy.stripe.com/test_premium?locale=es", &email, &id)
            .expect("url");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("locale".to_string(), "es".to_string())));
        assert!(pairs.contains(&("prefilled_email".to_string(), "ana+test@example.com".to_string())));
        assert!(pairs.contains(&("client_reference_id".to_string(), "uid-1".to_string())));
    }

    #[test]
    fn test_start_checkout_records_pending_change() {
        let (id, email) = ids();
        let now = Utc::now();
        let checkout =
            start_checkout(&config(), PlanTier::Free, PlanTier::Basic, &id, &email, now)
                .expect("checkout");
        assert_eq!(checkout.pending, PendingPlanChange::new(PlanTier::Basic, now));
        assert_eq!(checkout.url.host_str(), Some("buy.stripe.com"));
    }

    #[test]
    fn test_start_checkout_rejections() {
        let (id, email) = ids();
        let now = Utc::now();
        let config = config();
        assert!(matches!(
            start_checkout(&config, PlanTier::Basic, PlanTier::Free, &id, &email, now),
            Err(BillingError::NotPurchasable(PlanTier::Free))
        ));
        assert!(matches!(
            start_checkout(&config, PlanTier::Basic, PlanTier::Basic, &id, &email, now),
            Err(BillingError::AlreadyOnPlan(PlanTier::Basic))
        ));
        assert!(matches!(
            start_checkout(&config, PlanTier::Premium, PlanTier::Basic, &id, &email, now),
            Err(BillingError::DowngradeUnavailable)
        ));
        assert!(matches!(
            start_checkout(&config, PlanTier::Free, PlanTier::Enterprise, &id, &email, now),
            Err(BillingError::NoPaymentLink(PlanTier::Enterprise))
        ));
    }

    #[test]
    fn test_plan_for_amount() {
        assert_eq!(plan_for_amount(999), Some(PlanTier::Basic));
        assert_eq!(plan_for_amount(2499), Some(PlanTier::Premium));
        assert_eq!(plan_for_amount(9999), Some(PlanTier::Enterprise));
        assert_eq!(plan_for_amount(0), None);
        assert_eq!(plan_for_amount(1000), None);
    }

    #[test]
    fn test_newest_paid_plan_skips_unpaid() {
        let sessions: CheckoutSessionList = serde_json::from_str(
            r#"{"object":"list","data":[
                {"id":"cs_2","amount_total":2499,"payment_status":"unpaid"},
                {"id":"cs_1","amount_total":999,"payment_status":"paid"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(newest_paid_plan(&sessions), Some(PlanTier::Basic));
    }
}
