//! Gemini API client.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::GeminiConfig;

use super::error::{ApiErrorResponse, GeminiError};
use super::types::{GenerateRequest, GenerateResponse};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::Config` if the API key is not a valid header
    /// value or the HTTP client cannot be built.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| GeminiError::Config("API key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GeminiError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(GeminiClientInner { client }),
        })
    }

    /// Send one instruction to `model` and return the raw answer text.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::RateLimited` on HTTP 429, `GeminiError::Api`
    /// for other non-success statuses and `GeminiError::EmptyResponse`
    /// when no candidate text came back.
    #[instrument(skip(self, instruction), fields(model = %model))]
    pub async fn generate(&self, model: &str, instruction: &str) -> Result<String, GeminiError> {
        let url = format!("{GEMINI_API_BASE}/models/{model}:generateContent");

        let response = self
            .inner
            .client
            .post(url)
            .json(&GenerateRequest::from_text(instruction))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GeminiError::Parse(format!("Failed to parse response: {e}")))?;

        parsed
            .first_text()
            .map(ToOwned::to_owned)
            .ok_or(GeminiError::EmptyResponse)
    }

    /// Handle an error status code.
    async fn handle_error_status(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> GeminiError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return GeminiError::RateLimited(retry_after);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return GeminiError::Unauthorized("Invalid API key".to_string());
        }

        match response.text().await {
            Ok(body) => GeminiError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            },
            Err(e) => GeminiError::Http(e),
        }
    }
}

/// The provider message from an error body, or a generic fallback.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message.or(e.error.status))
        .unwrap_or_else(|| "Error".to_string())
}
