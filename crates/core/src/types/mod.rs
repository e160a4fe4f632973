//! Core types for Memory Therapy.
//!
//! This module provides type-safe wrappers for the workflow's domain concepts.

pub mod credential;
pub mod email;
pub mod id;
pub mod image;
pub mod memory;
pub mod payment;
pub mod plan;
pub mod prompt;
pub mod status;

pub use credential::{ApiKey, ApiKeyError, AuthFormError, Password, validate_auth_form};
pub use email::{Email, EmailError};
pub use id::{UserId, UserIdError};
pub use image::{GeneratedImage, ImageBackend, ImageSource, UnknownBackend};
pub use memory::{MemoryDescription, MemoryField, MemoryValidationError, sanitize_input};
pub use payment::{PAYMENT_SUCCESS_MARKER, PendingPlanChange};
pub use plan::{PlanTier, Quota, UnknownPlan};
pub use prompt::{EmptyPrompt, TherapeuticPrompt};
pub use status::SubscriptionStatus;
