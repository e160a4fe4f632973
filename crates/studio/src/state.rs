//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StudioConfig;
use crate::db::UserRepository;
use crate::gemini::{GeminiClient, GeminiError};
use crate::identity::{IdentityClient, IdentityError};
use crate::imaging::{ImageError, ImagingClient};
use crate::middleware::SignInBus;
use crate::services::billing::StripeLookup;
use crate::services::generation::GenerationService;
use crate::services::image::ImageSynthesizer;
use crate::services::ledger::UsageLedger;
use crate::services::prompt::{PromptSynthesizer, RetryPolicy};
use crate::services::reconciler::{BackgroundCheck, PaymentReturnReconciler};

/// Error building a provider client from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("gemini client: {0}")]
    Gemini(#[from] GeminiError),
    #[error("image clients: {0}")]
    Imaging(#[from] ImageError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
}

/// The generation workflow wired to the live providers and database.
pub type LiveGenerationService<'a> =
    GenerationService<GeminiClient, ImagingClient, UserRepository<'a>>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and provider clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StudioConfig,
    pool: PgPool,
    gemini: GeminiClient,
    imaging: ImagingClient,
    identity: IdentityClient,
    stripe: Option<StripeLookup>,
    sign_ins: SignInBus,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider client cannot be built from the
    /// configured credentials.
    pub fn new(config: StudioConfig, pool: PgPool) -> Result<Self, StateError> {
        let gemini = GeminiClient::new(&config.gemini)?;
        let imaging = ImagingClient::new(&config.imaging)?;
        let identity = IdentityClient::new(&config.identity)?;
        let stripe = StripeLookup::from_config(&config.billing);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gemini,
                imaging,
                identity,
                stripe,
                sign_ins: SignInBus::new(),
            }),
        })
    }

    /// Get a reference to the studio configuration.
    #[must_use]
    pub fn config(&self) -> &StudioConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Sign-in notifications for waiting payment returns.
    #[must_use]
    pub fn sign_ins(&self) -> &SignInBus {
        &self.inner.sign_ins
    }

    #[must_use]
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.inner.pool)
    }

    /// The prompt synthesizer over the configured Gemini models.
    #[must_use]
    pub fn prompt_synthesizer(&self) -> PromptSynthesizer<GeminiClient> {
        let gemini = &self.inner.config.gemini;
        PromptSynthesizer::new(
            self.inner.gemini.clone(),
            gemini.models.clone(),
            RetryPolicy::from(gemini),
        )
    }

    #[must_use]
    pub fn generation_service(&self) -> LiveGenerationService<'_> {
        GenerationService::new(
            self.prompt_synthesizer(),
            ImageSynthesizer::new(self.inner.imaging.clone()),
            UsageLedger::new(self.users()),
        )
    }

    #[must_use]
    pub fn reconciler(&self) -> PaymentReturnReconciler<UserRepository<'_>> {
        let billing = &self.inner.config.billing;
        PaymentReturnReconciler::new(self.users(), billing.return_window, billing.auth_wait)
    }

    /// The background purchase check, when a Stripe key is configured.
    #[must_use]
    pub fn background_check(&self) -> Option<BackgroundCheck<StripeLookup, UserRepository<'_>>> {
        self.inner
            .stripe
            .clone()
            .map(|lookup| BackgroundCheck::new(lookup, self.users()))
    }
}
