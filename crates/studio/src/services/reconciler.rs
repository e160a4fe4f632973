//! Applying a paid plan when the browser returns from the payment page.
//!
//! ```text
//! Idle --marker--> AwaitingReturn --no record------------> NothingToApply
//!                        |--record older than window----> Expired
//!                        v
//!                  AwaitingAuth --no sign-in in time-----> TimedOut
//!                        v
//!                    Applying --update failed------------> Failed
//!                        v
//!                      Done
//! ```
//!
//! The pending record survives `TimedOut` and `Failed`, so a later page load
//! inside the validity window can still apply it. `Done` removes it, and an
//! account whose plan was already set after the record was made counts as
//! applied, so a replayed return never resets usage twice.
//!
//! A second, throttled path ([`BackgroundCheck`]) asks the payment provider
//! about completed purchases for signed-in free-tier users.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memory_therapy_core::{PAYMENT_SUCCESS_MARKER, PendingPlanChange, PlanTier};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::billing::{BillingError, PaymentLookup};
use crate::db::{self, RepositoryError, UserStore};
use crate::models::{CurrentUser, UserAccount};

/// Browser-scoped durable state could not be read or written.
#[derive(Debug, Clone, Error)]
#[error("client state unavailable: {0}")]
pub struct ClientStoreError(pub String);

/// Where the pending plan change lives between checkout and return.
pub trait ClientStore: Send + Sync {
    fn pending_change(
        &self,
    ) -> impl Future<Output = Result<Option<PendingPlanChange>, ClientStoreError>> + Send;

    fn clear_pending_change(&self) -> impl Future<Output = Result<(), ClientStoreError>> + Send;
}

/// Who is signed in, with a push notification for new sign-ins.
pub trait AuthWatch: Send {
    /// The signed-in user right now.
    fn current(&self) -> impl Future<Output = Option<CurrentUser>> + Send;

    /// Wait until a user signs in, or `timeout` passes.
    fn wait_for_sign_in(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Option<CurrentUser>> + Send;
}

/// Errors that abort reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    ClientStore(#[from] ClientStoreError),
}

/// Reconciliation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconcileState {
    /// No success marker on the page load.
    Idle,
    AwaitingReturn,
    AwaitingAuth {
        change: PendingPlanChange,
    },
    Applying {
        change: PendingPlanChange,
        #[serde(skip)]
        user: CurrentUser,
    },
    /// The plan was updated and the record removed.
    Done { plan: PlanTier },
    /// Marker present but nothing recorded, or already applied.
    NothingToApply,
    /// The record was too old and has been discarded.
    Expired { plan: PlanTier },
    /// Nobody signed in within the wait; the record is kept.
    TimedOut { plan: PlanTier },
    /// The plan update itself failed; the record is kept.
    Failed { plan: PlanTier },
}

impl ReconcileState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::AwaitingReturn | Self::AwaitingAuth { .. } | Self::Applying { .. }
        )
    }

    /// The pending record was consumed or discarded, so the payment marker
    /// can leave the page URL. After a timeout or failure the marker stays
    /// and a reload retries.
    #[must_use]
    pub const fn record_settled(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::NothingToApply | Self::Expired { .. }
        )
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingReturn => "awaiting_return",
            Self::AwaitingAuth { .. } => "awaiting_auth",
            Self::Applying { .. } => "applying",
            Self::Done { .. } => "done",
            Self::NothingToApply => "nothing_to_apply",
            Self::Expired { .. } => "expired",
            Self::TimedOut { .. } => "timed_out",
            Self::Failed { .. } => "failed",
        }
    }

    /// Text for the page, if the outcome needs one.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Done { plan } => Some(format!(
                "Payment received. You are now on the {} plan.",
                plan.display_name()
            )),
            Self::Expired { .. } => Some(
                "Your payment session expired. Contact support if you were charged.".to_string(),
            ),
            Self::TimedOut { .. } => {
                Some("Sign in to finish activating your new plan.".to_string())
            }
            Self::Failed { .. } => Some(
                "We could not activate your plan yet. Reload the page to try again.".to_string(),
            ),
            _ => None,
        }
    }
}

/// Drives the payment-return state machine.
pub struct PaymentReturnReconciler<S> {
    users: S,
    window: chrono::Duration,
    auth_wait: Duration,
}

impl<S: UserStore> PaymentReturnReconciler<S> {
    /// `window` bounds the age of a pending record; `auth_wait` bounds how
    /// long to wait for a sign-in.
    #[must_use]
    pub fn new(users: S, window: Duration, auth_wait: Duration) -> Self {
        Self {
            users,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| PendingPlanChange::validity()),
            auth_wait,
        }
    }

    /// Run from `Idle` to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if the client store cannot be used.
    #[instrument(skip_all, fields(marker = ?marker))]
    pub async fn reconcile<C, A>(
        &self,
        marker: Option<&str>,
        store: &C,
        auth: &mut A,
        now: DateTime<Utc>,
    ) -> Result<ReconcileState, ReconcileError>
    where
        C: ClientStore,
        A: AuthWatch,
    {
        if marker != Some(PAYMENT_SUCCESS_MARKER) {
            return Ok(ReconcileState::Idle);
        }

        let mut state = ReconcileState::AwaitingReturn;
        while !state.is_terminal() {
            let next = self.step(state, store, auth, now).await?;
            tracing::debug!(state = next.name(), "Payment return transition");
            state = next;
        }

        tracing::info!(state = state.name(), "Payment return reconciled");
        Ok(state)
    }

    async fn step<C, A>(
        &self,
        state: ReconcileState,
        store: &C,
        auth: &mut A,
        now: DateTime<Utc>,
    ) -> Result<ReconcileState, ReconcileError>
    where
        C: ClientStore,
        A: AuthWatch,
    {
        let next = match state {
            ReconcileState::AwaitingReturn => match store.pending_change().await? {
                None => ReconcileState::NothingToApply,
                Some(change) if change.is_expired(now, self.window) => {
                    store.clear_pending_change().await?;
                    ReconcileState::Expired { plan: change.plan }
                }
                Some(change) => ReconcileState::AwaitingAuth { change },
            },
            ReconcileState::AwaitingAuth { change } => {
                let user = match auth.current().await {
                    Some(user) => Some(user),
                    None => auth.wait_for_sign_in(self.auth_wait).await,
                };
                match user {
                    Some(user) => ReconcileState::Applying { change, user },
                    None => ReconcileState::TimedOut { plan: change.plan },
                }
            }
            ReconcileState::Applying { change, user } => {
                match self.apply(&change, &user).await {
                    Ok(true) => {
                        store.clear_pending_change().await?;
                        ReconcileState::Done { plan: change.plan }
                    }
                    Ok(false) => {
                        store.clear_pending_change().await?;
                        ReconcileState::NothingToApply
                    }
                    Err(e) => {
                        tracing::error!(user_id = %user.id, plan = %change.plan, error = %e, "Plan update failed");
                        ReconcileState::Failed { plan: change.plan }
                    }
                }
            }
            terminal => terminal,
        };
        Ok(next)
    }

    /// Update the plan unless it was already set after the record was made.
    ///
    /// Returns whether an update happened.
    async fn apply(
        &self,
        change: &PendingPlanChange,
        user: &CurrentUser,
    ) -> Result<bool, RepositoryError> {
        let account = db::load_or_create(&self.users, &user.id, &user.email).await?;
        if already_applied(&account, change) {
            tracing::info!(user_id = %user.id, plan = %change.plan, "Plan change already applied");
            return Ok(false);
        }
        self.users.set_plan(&user.id, change.plan, Utc::now()).await?;
        Ok(true)
    }
}

fn already_applied(account: &UserAccount, change: &PendingPlanChange) -> bool {
    account.plan == change.plan
        && account
            .plan_updated_at
            .is_some_and(|at| at >= change.created_at)
}

/// Errors from the background purchase check. Logged, never shown.
#[derive(Debug, Error)]
pub enum BackgroundCheckError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Billing(#[from] BillingError),
}

/// Whether a background check is due, given when the last one ran.
#[must_use]
pub fn check_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    let Ok(interval) = chrono::Duration::from_std(interval) else {
        return false;
    };
    last.is_none_or(|last| now.signed_duration_since(last) >= interval)
}

/// Throttled lookup of purchases that never came back through the return page.
pub struct BackgroundCheck<L, S> {
    lookup: L,
    users: S,
}

impl<L: PaymentLookup, S: UserStore> BackgroundCheck<L, S> {
    #[must_use]
    pub const fn new(lookup: L, users: S) -> Self {
        Self { lookup, users }
    }

    /// Apply a completed purchase to a free-tier account.
    ///
    /// Returns the plan applied, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the account or the payment provider cannot be
    /// reached.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn run(&self, user: &CurrentUser) -> Result<Option<PlanTier>, BackgroundCheckError> {
        let account = db::load_or_create(&self.users, &user.id, &user.email).await?;
        if account.plan != PlanTier::Free {
            return Ok(None);
        }

        let Some(plan) = self.lookup.completed_purchase(&user.email).await? else {
            return Ok(None);
        };

        // The return page may have upgraded the account during the lookup
        if !self.users.upgrade_free(&user.id, plan, Utc::now()).await? {
            tracing::info!(plan = %plan, "Account left the free tier during the check");
            return Ok(None);
        }
        tracing::info!(plan = %plan, "Applied purchase found by background check");
        Ok(Some(plan))
    }
}
