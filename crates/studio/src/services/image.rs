//! Image synthesis with fallback across a backend's models.

use std::future::Future;

use memory_therapy_core::{
    ApiKey, ApiKeyError, GeneratedImage, ImageBackend, ImageSource, TherapeuticPrompt,
};
use thiserror::Error;
use tracing::instrument;

use super::{ProviderExhausted, WorkflowStep};
use crate::imaging::ImageError;

/// Image-generation backends, addressed by backend and model.
pub trait ImageProvider: Send + Sync {
    /// Models to try for `backend`, best first. Empty when the backend is
    /// unavailable.
    fn candidates(&self, backend: ImageBackend) -> Vec<String>;

    /// One generation attempt.
    fn generate(
        &self,
        backend: ImageBackend,
        model: &str,
        prompt: &TherapeuticPrompt,
        credential: Option<&ApiKey>,
    ) -> impl Future<Output = Result<ImageSource, ImageError>> + Send;
}

/// Why no image was produced.
#[derive(Debug, Error)]
pub enum ImageSynthesisError {
    /// The backend needs a caller credential and the one given is unusable.
    #[error(transparent)]
    InvalidCredential(#[from] ApiKeyError),

    #[error(transparent)]
    Exhausted(#[from] ProviderExhausted),
}

/// Generates an image, falling through the backend's models in order.
#[derive(Clone)]
pub struct ImageSynthesizer<P> {
    provider: P,
}

impl<P: ImageProvider> ImageSynthesizer<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Check the caller credential for `backend` without any network call.
    ///
    /// # Errors
    ///
    /// Returns `ApiKeyError` if the backend needs a credential and `raw` is
    /// missing or malformed.
    pub fn validate_credential(
        backend: ImageBackend,
        raw: Option<&str>,
    ) -> Result<Option<ApiKey>, ApiKeyError> {
        if backend.requires_credential() {
            ApiKey::parse(raw).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Generate an image for `prompt` on `backend`.
    ///
    /// Failed models are logged and skipped; the first success wins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredential` before any call is made if the backend
    /// needs a credential and none usable was given, and `Exhausted` when
    /// every model failed.
    #[instrument(skip(self, prompt, credential), fields(backend = %backend))]
    pub async fn synthesize(
        &self,
        prompt: &TherapeuticPrompt,
        backend: ImageBackend,
        credential: Option<&str>,
    ) -> Result<GeneratedImage, ImageSynthesisError> {
        let key = Self::validate_credential(backend, credential)?;
        let candidates = self.provider.candidates(backend);

        let mut last_error = candidates
            .is_empty()
            .then(|| ImageError::NotConfigured(backend).to_string());

        for model in candidates {
            match self
                .provider
                .generate(backend, &model, prompt, key.as_ref())
                .await
            {
                Ok(source) => {
                    tracing::info!(model = %model, "Image generated");
                    return Ok(GeneratedImage {
                        source,
                        backend,
                        model,
                    });
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Image model failed, trying next");
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(ProviderExhausted {
            step: WorkflowStep::Image,
            last_error,
        }
        .into())
    }
}
