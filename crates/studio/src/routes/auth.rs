//! Authentication route handlers.
//!
//! Credentials are checked by the identity provider; on success the user is
//! stored in the session, the account row is created on first sight and
//! any payment return waiting on this browser session is woken.

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use memory_therapy_core::{UsageSnapshot, validate_auth_form};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::db;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::identity::VerifiedIdentity;
use crate::middleware::{SignInEvent, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Signed-in user and their quota.
#[derive(Debug, Serialize)]
pub struct SignedIn {
    pub user: CurrentUser,
    pub usage: UsageSnapshot,
}

/// Handle registration form submission.
///
/// A new account is signed in straight away.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let (email, password) =
        validate_auth_form(&form.email, &form.password, Some(&form.password_confirm))?;

    let identity = state.identity().sign_up(&email, &password).await?;
    tracing::info!(user_id = %identity.user_id, "Account registered");

    let signed_in = complete_sign_in(&state, &session, identity).await?;
    Ok((StatusCode::CREATED, Json(signed_in)).into_response())
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Json<SignedIn>> {
    let (email, password) = validate_auth_form(&form.email, &form.password, None)?;

    let identity = state
        .identity()
        .sign_in(&email, &password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    Ok(Json(complete_sign_in(&state, &session, identity).await?))
}

/// Handle logout.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_sign_in(
    state: &AppState,
    session: &Session,
    identity: VerifiedIdentity,
) -> Result<SignedIn> {
    let user = CurrentUser {
        id: identity.user_id,
        email: identity.email,
    };

    let account = db::load_or_create(&state.users(), &user.id, &user.email).await?;
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    // Only an already-saved session can have a payment return waiting on it
    if let Some(session_id) = session.id() {
        state.sign_ins().publish(SignInEvent {
            session_id,
            user: user.clone(),
        });
    }

    Ok(SignedIn {
        user,
        usage: account.usage(),
    })
}
