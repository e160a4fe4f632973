//! The memory-to-image workflow.
//!
//! ```text
//! validate -> entitlement gate -> prompt synthesizer -> image synthesizer -> usage ledger
//! ```
//!
//! Validation failures stop the workflow before any network call. The gate
//! reads the account copy loaded for this request; nothing is reserved, so
//! two overlapping submissions from one user can both pass it.

use chrono::Utc;
use memory_therapy_core::{
    ApiKeyError, GeneratedImage, ImageBackend, MemoryDescription, MemoryValidationError,
    PlanTier, TherapeuticPrompt, UsageSnapshot,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use super::ProviderExhausted;
use super::image::{ImageProvider, ImageSynthesisError, ImageSynthesizer};
use super::ledger::UsageLedger;
use super::prompt::{PromptSynthesizer, TextGenerator};
use crate::db::UserStore;
use crate::models::UserAccount;

/// One form submission.
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySubmission {
    pub people: String,
    pub place: String,
    pub emotions: String,
    pub sensory_details: String,
    #[serde(default)]
    pub backend: ImageBackend,
    /// Caller's own key, for backends that bill the caller.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub prompt: TherapeuticPrompt,
    pub image: GeneratedImage,
    pub usage: UsageSnapshot,
}

/// Why a submission produced no image.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] MemoryValidationError),

    #[error(transparent)]
    InvalidCredential(#[from] ApiKeyError),

    #[error("monthly image quota reached on the {plan} plan ({used} used)")]
    QuotaExceeded { plan: PlanTier, used: u32 },

    #[error(transparent)]
    ProviderExhausted(#[from] ProviderExhausted),
}

impl From<ImageSynthesisError> for GenerationError {
    fn from(err: ImageSynthesisError) -> Self {
        match err {
            ImageSynthesisError::InvalidCredential(e) => Self::InvalidCredential(e),
            ImageSynthesisError::Exhausted(e) => Self::ProviderExhausted(e),
        }
    }
}

/// Runs submissions through prompt and image synthesis and records usage.
pub struct GenerationService<G, P, S> {
    prompts: PromptSynthesizer<G>,
    images: ImageSynthesizer<P>,
    ledger: UsageLedger<S>,
}

impl<G, P, S> GenerationService<G, P, S>
where
    G: TextGenerator,
    P: ImageProvider,
    S: UserStore,
{
    #[must_use]
    pub const fn new(
        prompts: PromptSynthesizer<G>,
        images: ImageSynthesizer<P>,
        ledger: UsageLedger<S>,
    ) -> Self {
        Self {
            prompts,
            images,
            ledger,
        }
    }

    /// Run one submission for `account`, updating its usage on success.
    ///
    /// # Errors
    ///
    /// - `Validation` / `InvalidCredential`: bad input, nothing was called
    /// - `QuotaExceeded`: the plan has no images left
    /// - `ProviderExhausted`: every model failed at the named step
    #[instrument(skip_all, fields(user_id = %account.id, plan = %account.plan, backend = %submission.backend))]
    pub async fn generate(
        &self,
        account: &mut UserAccount,
        submission: &MemorySubmission,
    ) -> Result<GenerationOutcome, GenerationError> {
        let memory = MemoryDescription::new(
            &submission.people,
            &submission.place,
            &submission.emotions,
            &submission.sensory_details,
        )?;
        ImageSynthesizer::<P>::validate_credential(
            submission.backend,
            submission.api_key.as_deref(),
        )?;

        if !account.can_generate() {
            tracing::info!(used = account.images_used, "Quota exceeded");
            return Err(GenerationError::QuotaExceeded {
                plan: account.plan,
                used: account.images_used,
            });
        }

        let prompt = self.prompts.synthesize(&memory).await?;
        let image = self
            .images
            .synthesize(&prompt, submission.backend, submission.api_key.as_deref())
            .await?;
        let usage = self.ledger.record_success(account, Utc::now()).await;

        Ok(GenerationOutcome {
            prompt,
            image,
            usage,
        })
    }
}
