//! Hugging Face inference backend.
//!
//! Text-to-image models answer with raw image bytes.

use std::sync::Arc;

use memory_therapy_core::{ImageSource, TherapeuticPrompt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;

use crate::config::ImagingConfig;

use super::error::{ImageError, error_from_response};

const HF_INFERENCE_BASE: &str = "https://router.huggingface.co/hf-inference/models";
const NEGATIVE_PROMPT: &str = "blurry, ugly, low quality, dark, scary";
const INFERENCE_STEPS: u32 = 28;
const GUIDANCE_SCALE: f32 = 7.5;
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    negative_prompt: &'static str,
    num_inference_steps: u32,
    guidance_scale: f32,
}

#[derive(Debug, serde::Deserialize)]
struct InferenceError {
    error: String,
}

/// Hugging Face inference client.
#[derive(Clone)]
pub struct HuggingFaceClient {
    inner: Arc<HuggingFaceClientInner>,
}

struct HuggingFaceClientInner {
    client: reqwest::Client,
    models: Vec<String>,
}

impl HuggingFaceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Config` if the token is not a valid header value.
    pub fn new(config: &ImagingConfig) -> Result<Self, ImageError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth =
            HeaderValue::from_str(&format!("Bearer {}", config.hf_token.expose_secret()))
                .map_err(|_| ImageError::Config("HF token is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ImageError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HuggingFaceClientInner {
                client,
                models: config.hf_models.clone(),
            }),
        })
    }

    /// Configured models in priority order.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.inner.models
    }

    /// Generate an image with one model.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the model answers with a
    /// non-success status, or the body is not an image.
    #[instrument(skip(self, prompt), fields(model = %model))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &TherapeuticPrompt,
    ) -> Result<ImageSource, ImageError> {
        let request = InferenceRequest {
            inputs: prompt.as_str(),
            parameters: InferenceParameters {
                negative_prompt: NEGATIVE_PROMPT,
                num_inference_steps: INFERENCE_STEPS,
                guidance_scale: GUIDANCE_SCALE,
            },
        };

        let response = self
            .inner
            .client
            .post(format!("{HF_INFERENCE_BASE}/{model}"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, |body| {
                serde_json::from_str::<InferenceError>(body)
                    .ok()
                    .map(|e| e.error)
            })
            .await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ImageError::Parse(format!(
                "expected image, got {content_type}"
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ImageError::EmptyResponse);
        }

        Ok(ImageSource::Inline {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
