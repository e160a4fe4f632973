//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. All route handlers return `Result<T, AppError>`;
//! the body is JSON `{"error": "...", "details": [...]}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use memory_therapy_core::AuthFormError;
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::identity::IdentityError;
use crate::services::billing::BillingError;
use crate::services::generation::GenerationError;
use crate::services::reconciler::ReconcileError;

/// Application-level error type for the studio.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The memory workflow produced no image.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Sign-up or sign-in was refused.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// The sign-up or sign-in form is invalid.
    #[error("Invalid form: {0}")]
    AuthForm(#[from] AuthFormError),

    /// Checkout could not start.
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// Payment return could not be processed.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// User is not signed in.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl AppError {
    /// Whether the failure is ours or an upstream's, rather than the caller's.
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Reconcile(_) | Self::Internal(_) => true,
            Self::Generation(err) => matches!(err, GenerationError::ProviderExhausted(_)),
            Self::Identity(err) => !matches!(err, IdentityError::Rejected { .. }),
            Self::Billing(err) => matches!(
                err,
                BillingError::NoPaymentLink(_)
                    | BillingError::InvalidLink(_)
                    | BillingError::Http(_)
                    | BillingError::Api { .. }
            ),
            Self::AuthForm(_) | Self::Unauthorized(_) | Self::BadRequest(_) => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Reconcile(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Generation(err) => match err {
                GenerationError::Validation(_) | GenerationError::InvalidCredential(_) => {
                    StatusCode::BAD_REQUEST
                }
                GenerationError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
                GenerationError::ProviderExhausted(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Identity(err) => match err.code() {
                Some("EMAIL_EXISTS") => StatusCode::CONFLICT,
                Some(
                    "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS",
                ) => StatusCode::UNAUTHORIZED,
                Some("USER_DISABLED" | "OPERATION_NOT_ALLOWED") => StatusCode::FORBIDDEN,
                Some("TOO_MANY_ATTEMPTS_TRY_LATER") => StatusCode::TOO_MANY_REQUESTS,
                Some(_) => StatusCode::BAD_REQUEST,
                None => StatusCode::BAD_GATEWAY,
            },
            Self::Billing(err) => match err {
                BillingError::NotPurchasable(_) => StatusCode::BAD_REQUEST,
                BillingError::AlreadyOnPlan(_) => StatusCode::CONFLICT,
                BillingError::DowngradeUnavailable => StatusCode::FORBIDDEN,
                BillingError::NoPaymentLink(_) => StatusCode::SERVICE_UNAVAILABLE,
                BillingError::InvalidLink(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BillingError::Http(_) | BillingError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::AuthForm(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    // Internal details never reach the client
    fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            Self::Database(_) | Self::Session(_) | Self::Reconcile(_) | Self::Internal(_) => {
                ("Internal server error".to_string(), Vec::new())
            }
            Self::Generation(GenerationError::Validation(err)) => (
                "Please complete the memory form".to_string(),
                err.problems.iter().map(|(_, msg)| msg.clone()).collect(),
            ),
            Self::Generation(err) => (err.to_string(), Vec::new()),
            Self::Identity(err) => (err.user_message(), Vec::new()),
            Self::AuthForm(err) => ("Please fix the form".to_string(), err.problems.clone()),
            Self::Billing(err) => match err {
                BillingError::InvalidLink(_) | BillingError::Http(_) | BillingError::Api { .. } => {
                    ("Payment service error".to_string(), Vec::new())
                }
                other => (other.to_string(), Vec::new()),
            },
            Self::Unauthorized(msg) | Self::BadRequest(msg) => (msg.clone(), Vec::new()),
        };
        ErrorBody { error, details }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("billing", "Started checkout", Some(&[("plan", "premium")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use memory_therapy_core::{MemoryDescription, PlanTier};

    use super::*;
    use crate::services::{ProviderExhausted, WorkflowStep};

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_generation_status_codes() {
        assert_eq!(
            get_status(GenerationError::QuotaExceeded {
                plan: PlanTier::Free,
                used: 1
            }
            .into()),
            StatusCode::PAYMENT_REQUIRED
        );
        let invalid = MemoryDescription::new("Mum", "", "calm", "bread").expect_err("invalid");
        assert_eq!(
            get_status(GenerationError::from(invalid).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                GenerationError::from(ProviderExhausted {
                    step: WorkflowStep::Prompt,
                    last_error: None,
                })
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_identity_status_codes() {
        let status = |msg: &str| get_status(IdentityError::from_provider_message(msg).into());
        assert_eq!(status("EMAIL_EXISTS"), StatusCode::CONFLICT);
        assert_eq!(status("INVALID_LOGIN_CREDENTIALS"), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status("WEAK_PASSWORD : Password should be at least 6 characters"),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_billing_status_codes() {
        assert_eq!(
            get_status(BillingError::DowngradeUnavailable.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(BillingError::AlreadyOnPlan(PlanTier::Basic).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let body = AppError::Internal("pool timed out".to_string()).body();
        assert_eq!(body.error, "Internal server error");

        let body = AppError::from(IdentityError::from_provider_message("EMAIL_EXISTS")).body();
        assert_eq!(body.error, "This email is already registered");
    }

    #[test]
    fn test_memory_problems_become_details() {
        let invalid = MemoryDescription::new("", "", "calm", "bread").expect_err("invalid");
        let body = AppError::from(GenerationError::from(invalid)).body();
        assert_eq!(body.details.len(), 2);
    }

    #[test]
    fn test_form_problems_become_details() {
        let err = AppError::from(AuthFormError {
            problems: vec!["Passwords do not match".to_string()],
        });
        assert_eq!(err.body().details, vec!["Passwords do not match".to_string()]);
    }
}
