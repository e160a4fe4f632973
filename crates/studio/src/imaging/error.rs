//! Error types for the image backends.

use memory_therapy_core::ImageBackend;
use thiserror::Error;

/// Errors from a single image-generation call.
#[derive(Debug, Error)]
pub enum ImageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("rate limited")]
    RateLimited,

    /// The credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered but returned no image.
    #[error("no image in response")]
    EmptyResponse,

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The backend is disabled by configuration.
    #[error("{0} backend is not configured")]
    NotConfigured(ImageBackend),

    /// A call needed a credential that was not supplied.
    #[error("{0} backend requires a credential")]
    MissingCredential(ImageBackend),

    /// Client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Map a non-success response to an [`ImageError`].
///
/// `message` extracts the provider's text from the body.
pub(crate) async fn error_from_response(
    response: reqwest::Response,
    message: impl FnOnce(&str) -> Option<String>,
) -> ImageError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ImageError::RateLimited;
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return ImageError::Unauthorized(format!("HTTP {}", status.as_u16()));
    }
    match response.text().await {
        Ok(body) => ImageError::Api {
            status: status.as_u16(),
            message: message(&body).unwrap_or(body),
        },
        Err(e) => ImageError::Http(e),
    }
}
