//! Checkout through payment return, with the session-backed adapters where
//! the scenario needs a real session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use memory_therapy_core::{PendingPlanChange, PlanTier};
use memory_therapy_integration_tests::{FixedAuth, MemoryClientStore, MemoryUsers, user};
use memory_therapy_studio::config::BillingConfig;
use memory_therapy_studio::middleware::session::record_pending_change;
use memory_therapy_studio::middleware::{
    SessionAuthWatch, SessionClientStore, SignInBus, SignInEvent,
};
use memory_therapy_studio::services::billing::start_checkout;
use memory_therapy_studio::services::reconciler::{PaymentReturnReconciler, ReconcileState};
use tower_sessions::{MemoryStore, Session};

const HOUR: Duration = Duration::from_secs(3600);
const AUTH_WAIT: Duration = Duration::from_secs(30);

fn billing() -> BillingConfig {
    BillingConfig {
        basic_link: Some("https://buy.stripe.com/test_basic".to_string()),
        premium_link: Some("https://buy.stripe.com/test_premium".to_string()),
        enterprise_link: None,
        stripe_secret_key: None,
        return_window: HOUR,
        auth_wait: AUTH_WAIT,
        check_interval: Duration::from_secs(86_400),
    }
}

#[tokio::test]
async fn test_checkout_then_return_upgrades_and_resets_usage() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    users.seed(&ana, PlanTier::Free, 3);

    let checkout = start_checkout(
        &billing(),
        PlanTier::Free,
        PlanTier::Basic,
        &ana.id,
        &ana.email,
        Utc::now(),
    )
    .expect("checkout");
    assert!(checkout.url.as_str().contains("client_reference_id=ana"));

    let store = MemoryClientStore::with(checkout.pending);
    let reconciler = PaymentReturnReconciler::new(&users, HOUR, AUTH_WAIT);
    let state = reconciler
        .reconcile(
            Some("success"),
            &store,
            &mut FixedAuth(Some(ana.clone())),
            Utc::now(),
        )
        .await
        .expect("reconcile");

    assert_eq!(state, ReconcileState::Done { plan: PlanTier::Basic });
    let account = users.get(&ana.id).expect("row");
    assert_eq!(account.plan, PlanTier::Basic);
    assert_eq!(account.images_used, 0);
    assert!(account.plan_updated_at.is_some());
    assert_eq!(store.pending(), None);
}

#[tokio::test]
async fn test_return_after_window_discards_without_upgrading() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    users.seed(&ana, PlanTier::Free, 1);

    let stale = PendingPlanChange::new(PlanTier::Premium, Utc::now() - chrono::Duration::hours(2));
    let store = MemoryClientStore::with(stale);

    let state = PaymentReturnReconciler::new(&users, HOUR, AUTH_WAIT)
        .reconcile(Some("success"), &store, &mut FixedAuth(Some(ana.clone())), Utc::now())
        .await
        .expect("reconcile");

    assert_eq!(state, ReconcileState::Expired { plan: PlanTier::Premium });
    assert!(state.user_message().is_some());
    assert_eq!(store.pending(), None);
    assert_eq!(users.get(&ana.id).expect("row").plan, PlanTier::Free);
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_return_times_out_then_succeeds_on_reload() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    let store = MemoryClientStore::with(PendingPlanChange::new(PlanTier::Premium, Utc::now()));
    let reconciler = PaymentReturnReconciler::new(&users, HOUR, AUTH_WAIT);

    let first = reconciler
        .reconcile(Some("success"), &store, &mut FixedAuth(None), Utc::now())
        .await
        .expect("reconcile");
    assert_eq!(first, ReconcileState::TimedOut { plan: PlanTier::Premium });
    assert!(store.pending().is_some());

    // First sight of the account happens during the apply
    let second = reconciler
        .reconcile(Some("success"), &store, &mut FixedAuth(Some(ana.clone())), Utc::now())
        .await
        .expect("reconcile");
    assert_eq!(second, ReconcileState::Done { plan: PlanTier::Premium });
    assert_eq!(users.get(&ana.id).expect("row").plan, PlanTier::Premium);
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_on_same_session_wakes_waiting_return() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    let bus = SignInBus::new();

    // Checkout runs on one request; the return arrives with the saved cookie
    let sessions = Arc::new(MemoryStore::default());
    let checkout = Session::new(None, sessions.clone(), None);
    record_pending_change(
        &checkout,
        &PendingPlanChange::new(PlanTier::Basic, Utc::now()),
    )
    .await
    .expect("record");
    checkout.save().await.expect("save");
    let session_id = checkout.id().expect("saved session has an id");
    let session = Session::new(Some(session_id), sessions, None);

    let store = SessionClientStore::new(session.clone());
    let mut auth = SessionAuthWatch::new(session.clone(), &bus);

    let publisher = bus.clone();
    let signed_in = ana.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        publisher.publish(SignInEvent {
            session_id,
            user: signed_in,
        });
    });

    let state = PaymentReturnReconciler::new(&users, HOUR, AUTH_WAIT)
        .reconcile(Some("success"), &store, &mut auth, Utc::now())
        .await
        .expect("reconcile");

    assert_eq!(state, ReconcileState::Done { plan: PlanTier::Basic });
    assert_eq!(users.get(&ana.id).expect("row").plan, PlanTier::Basic);
    assert_eq!(
        session
            .get::<PendingPlanChange>("pending_plan_change")
            .await
            .expect("get"),
        None
    );
}

#[tokio::test]
async fn test_no_marker_leaves_everything_alone() {
    let users = MemoryUsers::default();
    let store = MemoryClientStore::with(PendingPlanChange::new(PlanTier::Basic, Utc::now()));

    let state = PaymentReturnReconciler::new(&users, HOUR, AUTH_WAIT)
        .reconcile(None, &store, &mut FixedAuth(Some(user("ana"))), Utc::now())
        .await
        .expect("reconcile");

    assert_eq!(state, ReconcileState::Idle);
    assert!(store.pending().is_some());
}
