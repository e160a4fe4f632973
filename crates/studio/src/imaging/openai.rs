//! `OpenAI` images backend, billed to the caller's own API key.

use memory_therapy_core::{ApiKey, ImageSource, TherapeuticPrompt};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::{ImageError, error_from_response};

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

/// Model used for `OpenAI` generations.
pub const OPENAI_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// `OpenAI` images client.
///
/// Holds no credential; every call carries the caller's key.
#[derive(Clone, Default)]
pub struct OpenAiClient {
    client: reqwest::Client,
}

impl OpenAiClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate one image with `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no image URL comes back.
    #[instrument(skip(self, prompt, api_key), fields(model = %model))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &TherapeuticPrompt,
        api_key: &ApiKey,
    ) -> Result<ImageSource, ImageError> {
        let request = ImagesRequest {
            model,
            prompt: prompt.as_str(),
            n: 1,
            size: IMAGE_SIZE,
        };

        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(api_key.expose())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, |body| {
                serde_json::from_str::<OpenAiErrorResponse>(body)
                    .ok()
                    .map(|e| e.error.message)
            })
            .await);
        }

        let body: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Parse(e.to_string()))?;
        first_url(body)
    }
}

fn first_url(body: ImagesResponse) -> Result<ImageSource, ImageError> {
    body.data
        .into_iter()
        .next()
        .and_then(|d| d.url)
        .map(ImageSource::Remote)
        .ok_or(ImageError::EmptyResponse)
}
