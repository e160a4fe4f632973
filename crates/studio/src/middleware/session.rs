//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions, and adapts the
//! session to the payment-return reconciler: the pending plan change lives
//! in the session, and sign-ins are announced on a broadcast bus keyed by
//! session id so a waiting payment-return request can pick them up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use memory_therapy_core::PendingPlanChange;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tower_sessions::session::Id;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StudioConfig;
use crate::models::{CurrentUser, session_keys};
use crate::services::reconciler::{AuthWatch, ClientStore, ClientStoreError};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "mt_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Buffered sign-in events before slow receivers start lagging.
const SIGN_IN_BUS_CAPACITY: usize = 64;

/// Create the session layer with `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StudioConfig,
) -> SessionManagerLayer<PostgresStore> {
    // The sessions table is created by `mt-cli migrate`
    let store = PostgresStore::new(pool.clone());

    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Store the plan change to apply when the browser returns from payment.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn record_pending_change(
    session: &Session,
    change: &PendingPlanChange,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::PENDING_PLAN_CHANGE, change)
        .await
}

/// When the background purchase check last ran for this browser.
pub async fn last_payment_check(session: &Session) -> Option<DateTime<Utc>> {
    session
        .get(session_keys::LAST_PAYMENT_CHECK)
        .await
        .ok()
        .flatten()
}

/// Record that the background purchase check ran at `at`.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn mark_payment_check(
    session: &Session,
    at: DateTime<Utc>,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::LAST_PAYMENT_CHECK, at).await
}

/// A user signed in on the browser session `session_id`.
#[derive(Debug, Clone)]
pub struct SignInEvent {
    pub session_id: Id,
    pub user: CurrentUser,
}

/// Process-wide sign-in notifications.
#[derive(Clone)]
pub struct SignInBus {
    sender: broadcast::Sender<SignInEvent>,
}

impl Default for SignInBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignInBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGN_IN_BUS_CAPACITY);
        Self { sender }
    }

    /// Announce a sign-in. Nobody listening is fine.
    pub fn publish(&self, event: SignInEvent) {
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SignInEvent> {
        self.sender.subscribe()
    }
}

/// The session as the reconciler's client store.
pub struct SessionClientStore {
    session: Session,
}

impl SessionClientStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl ClientStore for SessionClientStore {
    async fn pending_change(&self) -> Result<Option<PendingPlanChange>, ClientStoreError> {
        self.session
            .get(session_keys::PENDING_PLAN_CHANGE)
            .await
            .map_err(|e| ClientStoreError(e.to_string()))
    }

    async fn clear_pending_change(&self) -> Result<(), ClientStoreError> {
        self.session
            .remove::<PendingPlanChange>(session_keys::PENDING_PLAN_CHANGE)
            .await
            .map(|_| ())
            .map_err(|e| ClientStoreError(e.to_string()))
    }
}

/// Sign-in state of one browser session.
///
/// Subscribes on construction, so a sign-in that lands between checking
/// [`AuthWatch::current`] and waiting is not missed.
pub struct SessionAuthWatch {
    session: Session,
    events: broadcast::Receiver<SignInEvent>,
}

impl SessionAuthWatch {
    #[must_use]
    pub fn new(session: Session, bus: &SignInBus) -> Self {
        Self {
            session,
            events: bus.subscribe(),
        }
    }

    async fn next_sign_in(&mut self, session_id: Id) -> Option<CurrentUser> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.session_id == session_id => return Some(event.user),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Sign-in watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl AuthWatch for SessionAuthWatch {
    async fn current(&self) -> Option<CurrentUser> {
        self.session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
    }

    async fn wait_for_sign_in(&mut self, timeout: Duration) -> Option<CurrentUser> {
        // A session without an id has never been saved, so no other request
        // can sign in on it
        let Some(session_id) = self.session.id() else {
            tokio::time::sleep(timeout).await;
            return None;
        };

        let user = tokio::time::timeout(timeout, self.next_sign_in(session_id))
            .await
            .ok()
            .flatten()?;

        // This request saves the whole session record when it finishes, so
        // it must carry the sign-in too
        if let Err(e) = self
            .session
            .insert(session_keys::CURRENT_USER, &user)
            .await
        {
            tracing::warn!(error = %e, "Failed to copy sign-in into waiting session");
        }
        Some(user)
    }
}
