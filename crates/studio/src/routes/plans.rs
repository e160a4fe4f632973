//! Plan catalogue.

use axum::{Json, extract::State};
use memory_therapy_core::{PlanTier, Quota};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::state::AppState;

/// One tier on the pricing page.
#[derive(Debug, Serialize)]
pub struct PlanView {
    pub id: PlanTier,
    pub name: &'static str,
    /// Monthly price in USD.
    pub price: Decimal,
    pub quota: Quota,
    pub features: &'static [&'static str],
    /// A payment link is configured for the tier.
    pub purchasable: bool,
}

/// List every plan, cheapest first.
pub async fn index(State(state): State<AppState>) -> Json<Vec<PlanView>> {
    let billing = &state.config().billing;
    Json(
        PlanTier::ALL
            .into_iter()
            .map(|plan| PlanView {
                id: plan,
                name: plan.display_name(),
                price: plan.monthly_price(),
                quota: plan.quota(),
                features: plan.features(),
                purchasable: billing.link_for(plan).is_some(),
            })
            .collect(),
    )
}
