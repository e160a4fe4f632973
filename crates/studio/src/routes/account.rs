//! Session and account overview.

use axum::{Json, extract::State};
use chrono::Utc;
use memory_therapy_core::{PendingPlanChange, UsageSnapshot};
use serde::Serialize;
use tower_sessions::Session;

use crate::db;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::middleware::session::{last_payment_check, mark_payment_check};
use crate::models::{CurrentUser, UserAccount, session_keys};
use crate::services::reconciler::check_due;
use crate::state::AppState;

/// What the page needs to render the header, usage meter and pricing.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: Option<CurrentUser>,
    pub account: Option<UserAccount>,
    pub usage: Option<UsageSnapshot>,
    pub pending_plan_change: Option<PendingPlanChange>,
}

/// Current session, account and usage.
///
/// For a signed-in user this also starts the background purchase check
/// when one is due.
pub async fn session(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<SessionView>> {
    let pending_plan_change = session
        .get(session_keys::PENDING_PLAN_CHANGE)
        .await
        .ok()
        .flatten();

    let Some(user) = user else {
        return Ok(Json(SessionView {
            user: None,
            account: None,
            usage: None,
            pending_plan_change,
        }));
    };

    let account = db::load_or_create(&state.users(), &user.id, &user.email).await?;
    maybe_start_background_check(&state, &session, &user).await;

    Ok(Json(SessionView {
        usage: Some(account.usage()),
        account: Some(account),
        user: Some(user),
        pending_plan_change,
    }))
}

async fn maybe_start_background_check(state: &AppState, session: &Session, user: &CurrentUser) {
    if state.background_check().is_none() {
        return;
    }

    let now = Utc::now();
    let interval = state.config().billing.check_interval;
    let last = last_payment_check(session).await;
    if !check_due(last, now, interval) {
        return;
    }

    if let Err(e) = mark_payment_check(session, now).await {
        tracing::warn!(error = %e, "Failed to record payment check time");
        return;
    }

    let state = state.clone();
    let user = user.clone();
    tokio::spawn(async move {
        let Some(check) = state.background_check() else {
            return;
        };
        if let Err(e) = check.run(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "Background payment check failed");
        }
    });
}
