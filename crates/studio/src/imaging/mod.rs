//! Image-generation backends.
//!
//! Three interchangeable services sit behind [`ImagingClient`]:
//!
//! - Hugging Face inference, several models tried in order
//! - `DeepAI` text2img, enabled by `DEEPAI_API_KEY`
//! - `OpenAI` images, paid with the caller's own key
//!
//! Fallback across models lives in [`crate::services::image`].

mod deepai;
mod error;
mod huggingface;
mod openai;

pub use deepai::{DEEPAI_MODEL, DeepAiClient};
pub use error::ImageError;
pub use huggingface::HuggingFaceClient;
pub use openai::{OPENAI_MODEL, OpenAiClient};

use memory_therapy_core::{ApiKey, ImageBackend, ImageSource, TherapeuticPrompt};

use crate::config::ImagingConfig;
use crate::services::image::ImageProvider;

/// All configured image backends.
#[derive(Clone)]
pub struct ImagingClient {
    huggingface: HuggingFaceClient,
    deepai: Option<DeepAiClient>,
    openai: OpenAiClient,
}

impl ImagingClient {
    /// Build every backend the configuration enables.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Config` if a credential is not usable as a header.
    pub fn new(config: &ImagingConfig) -> Result<Self, ImageError> {
        let deepai = config
            .deepai_api_key
            .as_ref()
            .map(DeepAiClient::new)
            .transpose()?;

        Ok(Self {
            huggingface: HuggingFaceClient::new(config)?,
            deepai,
            openai: OpenAiClient::new(),
        })
    }
}

impl ImageProvider for ImagingClient {
    fn candidates(&self, backend: ImageBackend) -> Vec<String> {
        match backend {
            ImageBackend::HuggingFace => self.huggingface.models().to_vec(),
            ImageBackend::DeepAi if self.deepai.is_some() => vec![DEEPAI_MODEL.to_string()],
            ImageBackend::DeepAi => Vec::new(),
            ImageBackend::OpenAi => vec![OPENAI_MODEL.to_string()],
        }
    }

    async fn generate(
        &self,
        backend: ImageBackend,
        model: &str,
        prompt: &TherapeuticPrompt,
        credential: Option<&ApiKey>,
    ) -> Result<ImageSource, ImageError> {
        match backend {
            ImageBackend::HuggingFace => self.huggingface.generate(model, prompt).await,
            ImageBackend::DeepAi => match &self.deepai {
                Some(client) => client.generate(prompt).await,
                None => Err(ImageError::NotConfigured(backend)),
            },
            ImageBackend::OpenAi => {
                let key = credential.ok_or(ImageError::MissingCredential(backend))?;
                self.openai.generate(model, prompt, key).await
            }
        }
    }
}
