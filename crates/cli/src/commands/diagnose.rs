//! Provider diagnostics.
//!
//! Sends a trivial instruction to each configured text model, in priority
//! order, and reports the first one that answers. Useful after rotating
//! `GEMINI_API_KEY` or changing `GEMINI_MODELS`.

use memory_therapy_studio::config::{ConfigError, GeminiConfig};
use memory_therapy_studio::gemini::{GeminiClient, GeminiError};
use memory_therapy_studio::services::prompt::{PromptSynthesizer, RetryPolicy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] GeminiError),

    #[error("no text model answered (tried: {0})")]
    NoModelAnswered(String),
}

/// Probe the text models.
///
/// # Errors
///
/// Returns an error if configuration is missing or no model answers.
pub async fn text_models() -> Result<String, DiagnoseError> {
    dotenvy::dotenv().ok();

    let config = GeminiConfig::from_env()?;
    let client = GeminiClient::new(&config)?;
    let synthesizer =
        PromptSynthesizer::new(client, config.models.clone(), RetryPolicy::from(&config));

    tracing::info!(models = ?synthesizer.models(), "Probing text models...");
    let model = synthesizer
        .probe()
        .await
        .ok_or_else(|| DiagnoseError::NoModelAnswered(config.models.join(", ")))?;

    tracing::info!(model = %model, "Text model available");
    Ok(model)
}
