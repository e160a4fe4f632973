//! Business logic services for the studio.
//!
//! # Services
//!
//! - `prompt` - therapeutic prompt generation with retry and model fallback
//! - `image` - image generation with model fallback
//! - `ledger` - usage accounting after a successful generation
//! - `generation` - the memory-to-image workflow tying the above together
//! - `reconciler` - applying a paid plan when the browser returns from payment
//! - `billing` - payment links and the background purchase lookup
//!
//! Every external call goes through a trait (`TextGenerator`,
//! `ImageProvider`, `UserStore`, `PaymentLookup`) so the workflow can be
//! exercised with in-memory fakes.

pub mod billing;
pub mod generation;
pub mod image;
pub mod ledger;
pub mod prompt;
pub mod reconciler;

use serde::Serialize;
use thiserror::Error;

/// A step of the memory-to-image workflow that calls a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Prompt,
    Image,
}

impl WorkflowStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every candidate provider for a step failed.
///
/// Terminal for the submission; the user may resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} generation failed with every provider")]
pub struct ProviderExhausted {
    pub step: WorkflowStep,
    /// The last provider failure, for logs.
    pub last_error: Option<String>,
}
