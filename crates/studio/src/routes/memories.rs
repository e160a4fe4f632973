//! Memory submissions.

use axum::{Json, extract::State};
use memory_therapy_core::{ImageBackend, TherapeuticPrompt, UsageSnapshot};
use serde::Serialize;

use crate::db;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::generation::MemorySubmission;
use crate::state::AppState;

/// A generated image with the prompt behind it and the updated quota.
#[derive(Debug, Serialize)]
pub struct GenerationView {
    pub prompt: TherapeuticPrompt,
    /// `data:` URL for inline images, the backend's URL otherwise.
    pub image_url: String,
    pub backend: ImageBackend,
    pub model: String,
    pub usage: UsageSnapshot,
}

/// Run the memory-to-image workflow for the signed-in user.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(submission): Json<MemorySubmission>,
) -> Result<Json<GenerationView>> {
    add_breadcrumb(
        "memory",
        "Submitted memory",
        Some(&[("backend", submission.backend.as_str())]),
    );

    let mut account = db::load_or_create(&state.users(), &user.id, &user.email).await?;
    let outcome = state
        .generation_service()
        .generate(&mut account, &submission)
        .await?;

    Ok(Json(GenerationView {
        image_url: outcome.image.source.display_url(),
        prompt: outcome.prompt,
        backend: outcome.image.backend,
        model: outcome.image.model,
        usage: outcome.usage,
    }))
}
