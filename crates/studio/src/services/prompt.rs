//! Prompt synthesis: memory description in, therapeutic image prompt out.
//!
//! Models are tried in priority order. Within a model, a rate-limit answer
//! is retried after an exponential delay (`2^attempt * base`) up to
//! `max_attempts` times; any other failure moves on to the next model
//! straight away.

use std::future::Future;
use std::time::Duration;

use memory_therapy_core::{MemoryDescription, TherapeuticPrompt};
use tracing::instrument;

use super::{ProviderExhausted, WorkflowStep};
use crate::config::GeminiConfig;
use crate::gemini::{GeminiClient, GeminiError};

/// A text-generation backend.
pub trait TextGenerator: Send + Sync {
    /// Send `instruction` to `model` and return the raw answer.
    fn generate(
        &self,
        model: &str,
        instruction: &str,
    ) -> impl Future<Output = Result<String, GeminiError>> + Send;
}

impl TextGenerator for GeminiClient {
    fn generate(
        &self,
        model: &str,
        instruction: &str,
    ) -> impl Future<Output = Result<String, GeminiError>> + Send {
        Self::generate(self, model, instruction)
    }
}

/// Attempts per model and the rate-limit backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the rate-limited `attempt` (zero-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl From<&GeminiConfig> for RetryPolicy {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: config.backoff_base,
        }
    }
}

/// Turns a memory into a prompt using a list of text models.
#[derive(Clone)]
pub struct PromptSynthesizer<G> {
    generator: G,
    models: Vec<String>,
    retry: RetryPolicy,
}

impl<G: TextGenerator> PromptSynthesizer<G> {
    #[must_use]
    pub const fn new(generator: G, models: Vec<String>, retry: RetryPolicy) -> Self {
        Self {
            generator,
            models,
            retry,
        }
    }

    /// Models in the order they are tried.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Produce a therapeutic prompt for `memory`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderExhausted`] when no model produced usable text.
    #[instrument(skip_all, fields(models = self.models.len()))]
    pub async fn synthesize(
        &self,
        memory: &MemoryDescription,
    ) -> Result<TherapeuticPrompt, ProviderExhausted> {
        let instruction = TherapeuticPrompt::instruction_for(memory);
        let mut last_error = None;

        for model in &self.models {
            match self.try_model(model, &instruction).await {
                Ok(prompt) => {
                    tracing::info!(model = %model, "Prompt generated");
                    return Ok(prompt);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        Err(ProviderExhausted {
            step: WorkflowStep::Prompt,
            last_error,
        })
    }

    /// Up to `max_attempts` calls to one model.
    async fn try_model(
        &self,
        model: &str,
        instruction: &str,
    ) -> Result<TherapeuticPrompt, GeminiError> {
        let mut attempt = 0;
        loop {
            let result = self
                .generator
                .generate(model, instruction)
                .await
                .and_then(|raw| {
                    TherapeuticPrompt::from_generated(&raw).map_err(|_| GeminiError::EmptyResponse)
                });

            match result {
                Ok(prompt) => return Ok(prompt),
                Err(e) if e.is_rate_limited() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        model = %model,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(model = %model, attempt = attempt + 1, error = %e, "Model failed");
                    return Err(e);
                }
            }
        }
    }

    /// First model that answers a trivial instruction, if any.
    ///
    /// Used by diagnostics; makes one call per model, no retries.
    pub async fn probe(&self) -> Option<String> {
        for model in &self.models {
            match self.generator.generate(model, "Say 'OK'").await {
                Ok(_) => return Some(model.clone()),
                Err(e) => tracing::warn!(model = %model, error = %e, "Probe failed"),
            }
        }
        None
    }
}
