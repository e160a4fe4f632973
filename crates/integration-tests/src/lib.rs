//! Integration tests for Memory Therapy Studio.
//!
//! Scenarios run through the studio library's public API with the external
//! providers, the database and the browser session replaced by the
//! in-memory fakes below. No network or database is needed.
//!
//! ```bash
//! cargo test -p memory-therapy-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use memory_therapy_core::{
    ApiKey, Email, ImageBackend, ImageSource, PendingPlanChange, PlanTier, TherapeuticPrompt,
    UserId,
};
use memory_therapy_studio::db::{RepositoryError, UserStore};
use memory_therapy_studio::gemini::GeminiError;
use memory_therapy_studio::imaging::ImageError;
use memory_therapy_studio::models::{CurrentUser, UserAccount};
use memory_therapy_studio::services::image::ImageProvider;
use memory_therapy_studio::services::prompt::TextGenerator;
use memory_therapy_studio::services::reconciler::{AuthWatch, ClientStore, ClientStoreError};

/// A signed-in user for scenarios.
#[must_use]
pub fn user(id: &str) -> CurrentUser {
    CurrentUser {
        id: UserId::new(id).expect("valid id"),
        email: Email::parse(&format!("{id}@example.com")).expect("valid email"),
    }
}

/// `users` table in memory.
#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<HashMap<UserId, UserAccount>>,
}

impl MemoryUsers {
    /// Insert an account on `plan` with `used` images already counted.
    pub fn seed(&self, user: &CurrentUser, plan: PlanTier, used: u32) -> UserAccount {
        let mut account = UserAccount::with_defaults(user.id.clone(), user.email.clone(), Utc::now());
        account.plan = plan;
        account.images_used = used;
        self.rows
            .lock()
            .unwrap()
            .insert(user.id.clone(), account.clone());
        account
    }

    #[must_use]
    pub fn get(&self, id: &UserId) -> Option<UserAccount> {
        self.rows.lock().unwrap().get(id).cloned()
    }
}

impl UserStore for MemoryUsers {
    async fn find(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn create_default(
        &self,
        id: &UserId,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserAccount, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(|| UserAccount::with_defaults(id.clone(), email.clone(), now))
            .clone())
    }

    async fn record_usage(&self, id: &UserId, at: DateTime<Utc>) -> Result<u32, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let account = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        account.images_used += 1;
        account.last_image_at = Some(at);
        Ok(account.images_used)
    }

    async fn set_plan(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let account = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        account.plan = plan;
        account.images_used = 0;
        account.plan_updated_at = Some(at);
        Ok(())
    }

    async fn upgrade_free(
        &self,
        id: &UserId,
        plan: PlanTier,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        if self.get(id).is_none_or(|account| account.plan != PlanTier::Free) {
            return Ok(false);
        }
        self.set_plan(id, plan, at).await?;
        Ok(true)
    }
}

/// Text model that replays scripted answers, then keeps answering.
#[derive(Default)]
pub struct ScriptedText {
    answers: Mutex<VecDeque<Result<String, GeminiError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedText {
    #[must_use]
    pub fn new(answers: Vec<Result<String, GeminiError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Models called, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl TextGenerator for &ScriptedText {
    async fn generate(&self, model: &str, _instruction: &str) -> Result<String, GeminiError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("A sunlit kitchen with bread on the table".to_string()))
    }
}

/// Image backend whose first `failures` calls fail.
pub struct ScriptedImages {
    models: Vec<String>,
    failures: Mutex<usize>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedImages {
    #[must_use]
    pub fn new(models: &[&str], failures: usize) -> Self {
        Self {
            models: models.iter().map(ToString::to_string).collect(),
            failures: Mutex::new(failures),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ImageProvider for &ScriptedImages {
    fn candidates(&self, _backend: ImageBackend) -> Vec<String> {
        self.models.clone()
    }

    async fn generate(
        &self,
        _backend: ImageBackend,
        model: &str,
        _prompt: &TherapeuticPrompt,
        _credential: Option<&ApiKey>,
    ) -> Result<ImageSource, ImageError> {
        self.calls.lock().unwrap().push(model.to_string());
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ImageError::Api {
                status: 503,
                message: "model is loading".to_string(),
            });
        }
        Ok(ImageSource::Inline {
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

/// Browser storage holding at most one pending plan change.
#[derive(Default)]
pub struct MemoryClientStore {
    pending: Mutex<Option<PendingPlanChange>>,
}

impl MemoryClientStore {
    #[must_use]
    pub fn with(change: PendingPlanChange) -> Self {
        Self {
            pending: Mutex::new(Some(change)),
        }
    }

    #[must_use]
    pub fn pending(&self) -> Option<PendingPlanChange> {
        *self.pending.lock().unwrap()
    }
}

impl ClientStore for MemoryClientStore {
    async fn pending_change(&self) -> Result<Option<PendingPlanChange>, ClientStoreError> {
        Ok(self.pending())
    }

    async fn clear_pending_change(&self) -> Result<(), ClientStoreError> {
        *self.pending.lock().unwrap() = None;
        Ok(())
    }
}

/// Sign-in state that is either fixed or never changes while waiting.
pub struct FixedAuth(pub Option<CurrentUser>);

impl AuthWatch for FixedAuth {
    async fn current(&self) -> Option<CurrentUser> {
        self.0.clone()
    }

    async fn wait_for_sign_in(&mut self, timeout: Duration) -> Option<CurrentUser> {
        tokio::time::sleep(timeout).await;
        None
    }
}
