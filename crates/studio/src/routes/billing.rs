//! Checkout, payment return and plan downgrade.

use axum::{
    Form, Json,
    extract::{Query, State},
};
use chrono::Utc;
use memory_therapy_core::PlanTier;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::db;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::session::record_pending_change;
use crate::middleware::{RequireAuth, SessionAuthWatch, SessionClientStore};
use crate::services::billing::{self, BillingError};
use crate::services::reconciler::ReconcileState;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub plan: PlanTier,
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    /// Where to send the browser.
    pub url: String,
}

/// Query parameters the payment page appends on its way back.
#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub payment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReturnView {
    #[serde(flatten)]
    pub state: ReconcileState,
    pub message: Option<String>,
    /// The page URL without the payment marker, for `history.replaceState`.
    /// Absent while the pending change still waits to be applied.
    pub clean_url: Option<String>,
}

/// Record the intended plan and hand back the payment link.
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Json<CheckoutView>> {
    let account = db::load_or_create(&state.users(), &user.id, &user.email).await?;
    let checkout = billing::start_checkout(
        &state.config().billing,
        account.plan,
        form.plan,
        &user.id,
        &user.email,
        Utc::now(),
    )?;

    record_pending_change(&session, &checkout.pending).await?;
    add_breadcrumb(
        "billing",
        "Started checkout",
        Some(&[("plan", form.plan.as_str())]),
    );
    tracing::info!(user_id = %user.id, plan = %form.plan, "Checkout started");

    Ok(Json(CheckoutView {
        url: checkout.url.into(),
    }))
}

/// Landing page after the payment provider.
///
/// May hold the request open while waiting for a sign-in on this session.
pub async fn payment_return(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ReturnQuery>,
) -> Result<Json<ReturnView>> {
    let store = SessionClientStore::new(session.clone());
    let mut auth = SessionAuthWatch::new(session, state.sign_ins());

    let outcome = state
        .reconciler()
        .reconcile(query.payment.as_deref(), &store, &mut auth, Utc::now())
        .await?;

    let clean_url = outcome
        .record_settled()
        .then(|| format!("{}/", state.config().base_url.trim_end_matches('/')));

    Ok(Json(ReturnView {
        message: outcome.user_message(),
        state: outcome,
        clean_url,
    }))
}

/// Paid plans only change through a new payment.
pub async fn downgrade(RequireAuth(user): RequireAuth) -> Result<Json<()>> {
    tracing::info!(user_id = %user.id, "Downgrade requested");
    Err(BillingError::DowngradeUnavailable.into())
}
