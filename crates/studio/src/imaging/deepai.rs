//! `DeepAI` text2img backend.

use std::sync::Arc;

use memory_therapy_core::{ImageSource, TherapeuticPrompt};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::error::{ImageError, error_from_response};

const DEEPAI_TEXT2IMG_URL: &str = "https://api.deepai.org/api/text2img";

/// The single model name reported for `DeepAI` results.
pub const DEEPAI_MODEL: &str = "text2img";

#[derive(Debug, Deserialize)]
struct Text2ImgResponse {
    output_url: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

/// `DeepAI` client.
#[derive(Clone)]
pub struct DeepAiClient {
    inner: Arc<reqwest::Client>,
}

impl DeepAiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Config` if the key is not a valid header value.
    pub fn new(api_key: &SecretString) -> Result<Self, ImageError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| ImageError::Config("DeepAI key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ImageError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(client),
        })
    }

    /// Generate an image; the result is hosted by `DeepAI`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no `output_url` comes back.
    #[instrument(skip_all)]
    pub async fn generate(&self, prompt: &TherapeuticPrompt) -> Result<ImageSource, ImageError> {
        let response = self
            .inner
            .post(DEEPAI_TEXT2IMG_URL)
            .form(&[("text", prompt.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, |body| {
                serde_json::from_str::<Text2ImgResponse>(body)
                    .ok()
                    .and_then(|r| r.err)
            })
            .await);
        }

        let body: Text2ImgResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Parse(e.to_string()))?;
        remote_source(body)
    }
}

fn remote_source(body: Text2ImgResponse) -> Result<ImageSource, ImageError> {
    match body.output_url {
        Some(url) if !url.is_empty() => Ok(ImageSource::Remote(url)),
        _ => Err(body
            .err
            .map_or(ImageError::EmptyResponse, ImageError::Parse)),
    }
}
