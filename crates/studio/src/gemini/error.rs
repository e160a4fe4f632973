//! Error types for the Gemini API client.

use thiserror::Error;

/// Errors that can occur when calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gemini returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider message, or "Error" when the body had none.
        message: String,
    },

    /// Rate limited by the API (HTTP 429).
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The API key was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response had no candidate text.
    #[error("empty response")]
    EmptyResponse,

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GeminiError {
    /// Whether the failure is a rate-limit signal worth waiting out.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Error envelope returned by Google APIs.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error details from Google APIs.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
