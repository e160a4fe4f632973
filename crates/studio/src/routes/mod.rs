//! HTTP route handlers for the studio.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Database readiness
//!
//! # Auth (rate limited)
//! POST /auth/register          - Sign-up
//! POST /auth/login             - Sign-in
//! POST /auth/logout            - Sign-out
//!
//! # API
//! GET  /api/plans              - Plan catalogue
//! GET  /api/session            - Session, account and usage
//! POST /api/memories           - Memory-to-image workflow (requires auth)
//!
//! # Billing
//! POST /billing/checkout       - Record pending plan change, return payment URL
//! GET  /billing/return         - Payment-return reconciliation
//! POST /billing/downgrade      - Refused
//! ```

pub mod account;
pub mod auth;
pub mod billing;
pub mod memories;
pub mod plans;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, generation_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(plans::index))
        .route("/session", get(account::session))
        .route(
            "/memories",
            post(memories::create).layer(generation_rate_limiter()),
        )
}

/// Create the billing routes router.
pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(billing::checkout))
        .route("/return", get(billing::payment_return))
        .route("/downgrade", post(billing::downgrade))
}

/// Create all routes for the studio.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
        .nest("/billing", billing_routes())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::Utc;
    use memory_therapy_core::{PendingPlanChange, PlanTier};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

    use super::*;
    use crate::config::StudioConfig;
    use crate::config::tests::test_config;
    use crate::middleware::session::record_pending_change;
    use crate::models::session_keys;

    const CLIENT_IP: &str = "203.0.113.9";

    /// Router over a pool that never connects; only paths that stop before
    /// the database are exercised.
    fn app_with(config: StudioConfig, sessions: MemoryStore) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/test")
            .expect("lazy pool");
        let state = AppState::new(config, pool).expect("state");
        routes()
            .layer(SessionManagerLayer::new(sessions))
            .with_state(state)
    }

    fn app() -> Router {
        app_with(test_config(), MemoryStore::default())
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    fn login(body: &'static str) -> Request<Body> {
        Request::post("/auth/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-forwarded-for", CLIENT_IP)
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn test_plan_catalogue() {
        let response = app()
            .oneshot(Request::get("/api/plans").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let plans = json(response).await;
        assert_eq!(plans.as_array().map(Vec::len), Some(4));
        assert_eq!(plans[0]["id"], "free");
        assert_eq!(plans[0]["purchasable"], false);
        assert_eq!(plans[1]["purchasable"], true);
        assert_eq!(plans[3]["quota"]["kind"], "unlimited");
    }

    #[tokio::test]
    async fn test_anonymous_session() {
        let response = app()
            .oneshot(Request::get("/api/session").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json(response).await["user"].is_null());
    }

    #[tokio::test]
    async fn test_protected_routes_need_sign_in() {
        let app = app();
        for (path, body) in [
            ("/api/memories", r#"{"people":"a","place":"b","emotions":"c","sensory_details":"ddddd"}"#),
            ("/billing/downgrade", ""),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::post(path)
                        .header("content-type", "application/json")
                        .header("x-forwarded-for", CLIENT_IP)
                        .body(Body::from(body))
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        }
    }

    #[tokio::test]
    async fn test_invalid_login_form_lists_problems() {
        let response = app()
            .oneshot(login("email=not-an-email&password=123"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        assert_eq!(body["details"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_login_is_rate_limited_per_ip() {
        let app = app();
        let mut statuses = Vec::new();
        for _ in 0..6 {
            let response = app
                .clone()
                .oneshot(login("email=x&password=y"))
                .await
                .expect("response");
            statuses.push(response.status());
        }
        assert!(statuses[..5].iter().all(|s| *s == StatusCode::BAD_REQUEST));
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_return_without_pending_change_cleans_url() {
        let response = app()
            .oneshot(
                Request::get("/billing/return?payment=success")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["state"], "nothing_to_apply");
        assert_eq!(body["clean_url"], "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_signed_out_return_keeps_marker() {
        let sessions = MemoryStore::default();
        let checkout = Session::new(None, std::sync::Arc::new(sessions.clone()), None);
        record_pending_change(&checkout, &PendingPlanChange::new(PlanTier::Basic, Utc::now()))
            .await
            .expect("record");
        checkout.save().await.expect("save");
        let session_id = checkout.id().expect("saved session has an id");
        let cookie = format!("id={session_id}");

        let mut config = test_config();
        config.billing.auth_wait = Duration::from_millis(20);
        let response = app_with(config, sessions.clone())
            .oneshot(
                Request::get("/billing/return?payment=success")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["state"], "timed_out");
        assert_eq!(body["plan"], "basic");
        assert!(body["message"].is_string());
        assert!(body["clean_url"].is_null());

        // A reload can still apply it
        let reopened = Session::new(Some(session_id), std::sync::Arc::new(sessions), None);
        let pending: Option<PendingPlanChange> = reopened
            .get(session_keys::PENDING_PLAN_CHANGE)
            .await
            .expect("get");
        assert_eq!(pending.map(|change| change.plan), Some(PlanTier::Basic));
    }
}
