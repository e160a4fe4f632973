//! End-to-end runs of the memory-to-image workflow against in-memory fakes.

use std::time::Duration;

use memory_therapy_core::{ImageBackend, PlanTier};
use memory_therapy_integration_tests::{MemoryUsers, ScriptedImages, ScriptedText, user};
use memory_therapy_studio::gemini::GeminiError;
use memory_therapy_studio::services::generation::{
    GenerationError, GenerationService, MemorySubmission,
};
use memory_therapy_studio::services::image::ImageSynthesizer;
use memory_therapy_studio::services::ledger::UsageLedger;
use memory_therapy_studio::services::prompt::{PromptSynthesizer, RetryPolicy};
use memory_therapy_studio::services::WorkflowStep;

fn submission() -> MemorySubmission {
    MemorySubmission {
        people: "my grandmother".to_string(),
        place: "her kitchen in Valencia".to_string(),
        emotions: "safe, warm".to_string(),
        sensory_details: "smell of fresh bread".to_string(),
        backend: ImageBackend::HuggingFace,
        api_key: None,
    }
}

fn service<'a>(
    text: &'a ScriptedText,
    images: &'a ScriptedImages,
    users: &'a MemoryUsers,
) -> GenerationService<&'a ScriptedText, &'a ScriptedImages, &'a MemoryUsers> {
    GenerationService::new(
        PromptSynthesizer::new(
            text,
            vec!["gemini-2.5-flash".to_string(), "gemini-2.5-pro".to_string()],
            RetryPolicy::default(),
        ),
        ImageSynthesizer::new(images),
        UsageLedger::new(users),
    )
}

#[tokio::test]
async fn test_last_basic_image_then_quota_exceeded() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    let mut account = users.seed(&ana, PlanTier::Basic, 9);
    let text = ScriptedText::default();
    let images = ScriptedImages::new(&["flux", "sd-1.5"], 0);
    let service = service(&text, &images, &users);

    let outcome = service
        .generate(&mut account, &submission())
        .await
        .expect("tenth image");
    assert_eq!(outcome.usage.used, 10);
    assert_eq!(outcome.usage.remaining, Some(0));
    assert!(outcome.usage.exhausted);
    assert_eq!(users.get(&ana.id).expect("row").images_used, 10);

    let err = service
        .generate(&mut account, &submission())
        .await
        .expect_err("quota reached");
    assert!(matches!(
        err,
        GenerationError::QuotaExceeded {
            plan: PlanTier::Basic,
            used: 10
        }
    ));
    // The rejected submission never reached a provider
    assert_eq!(text.calls().len(), 1);
    assert_eq!(images.calls().len(), 1);
}

#[tokio::test]
async fn test_enterprise_is_never_gated() {
    let users = MemoryUsers::default();
    let mut account = users.seed(&user("corp"), PlanTier::Enterprise, 10_000);
    let text = ScriptedText::default();
    let images = ScriptedImages::new(&["flux"], 0);

    let outcome = service(&text, &images, &users)
        .generate(&mut account, &submission())
        .await
        .expect("unlimited");
    assert_eq!(outcome.usage.used, 10_001);
    assert_eq!(outcome.usage.remaining, None);
}

#[tokio::test]
async fn test_invalid_memory_calls_nothing() {
    let users = MemoryUsers::default();
    let mut account = users.seed(&user("ana"), PlanTier::Free, 0);
    let text = ScriptedText::default();
    let images = ScriptedImages::new(&["flux"], 0);

    let mut blank = submission();
    blank.place = "  <>  ".to_string();
    blank.sensory_details = "hot".to_string();

    let err = service(&text, &images, &users)
        .generate(&mut account, &blank)
        .await
        .expect_err("invalid");
    let GenerationError::Validation(invalid) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(invalid.problems.len(), 2);
    assert!(text.calls().is_empty());
    assert_eq!(account.images_used, 0);
}

#[tokio::test]
async fn test_own_key_backend_checks_key_before_quota() {
    let users = MemoryUsers::default();
    let mut account = users.seed(&user("ana"), PlanTier::Free, 3);
    let text = ScriptedText::default();
    let images = ScriptedImages::new(&["dall-e-3"], 0);

    let mut openai = submission();
    openai.backend = ImageBackend::OpenAi;
    openai.api_key = Some("not-a-key".to_string());

    let err = service(&text, &images, &users)
        .generate(&mut account, &openai)
        .await
        .expect_err("bad key");
    assert!(matches!(err, GenerationError::InvalidCredential(_)));
    assert!(text.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_model_falls_back_after_backoff() {
    let users = MemoryUsers::default();
    let mut account = users.seed(&user("ana"), PlanTier::Free, 0);
    let text = ScriptedText::new(vec![
        Err(GeminiError::RateLimited(30)),
        Err(GeminiError::RateLimited(30)),
        Err(GeminiError::RateLimited(30)),
        Ok("A quiet harbour at dawn, soft pastel light".to_string()),
    ]);
    let images = ScriptedImages::new(&["flux"], 0);

    let start = tokio::time::Instant::now();
    let outcome = service(&text, &images, &users)
        .generate(&mut account, &submission())
        .await
        .expect("second model answers");

    assert_eq!(
        text.calls(),
        vec![
            "gemini-2.5-flash",
            "gemini-2.5-flash",
            "gemini-2.5-flash",
            "gemini-2.5-pro"
        ]
    );
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
    assert_eq!(
        outcome.prompt.as_str(),
        "A quiet harbour at dawn, soft pastel light"
    );
}

#[tokio::test]
async fn test_image_failures_fall_through_and_do_not_charge_on_exhaustion() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    let mut account = users.seed(&ana, PlanTier::Free, 1);
    let text = ScriptedText::default();

    let images = ScriptedImages::new(&["flux", "sd-1.5", "sd-1.4"], 2);
    let outcome = service(&text, &images, &users)
        .generate(&mut account, &submission())
        .await
        .expect("third model works");
    assert_eq!(outcome.image.model, "sd-1.4");
    assert!(outcome.image.source.display_url().starts_with("data:image/png;base64,"));
    assert_eq!(account.images_used, 2);

    let broken = ScriptedImages::new(&["flux", "sd-1.5"], 2);
    let err = service(&text, &broken, &users)
        .generate(&mut account, &submission())
        .await
        .expect_err("every model fails");
    let GenerationError::ProviderExhausted(exhausted) = err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(exhausted.step, WorkflowStep::Image);
    assert_eq!(account.images_used, 2);
    assert_eq!(users.get(&ana.id).expect("row").images_used, 2);
}

#[tokio::test]
async fn test_overlapping_submissions_each_count() {
    let users = MemoryUsers::default();
    let ana = user("ana");
    // Two tabs loaded the account before either submission finished
    let mut first_tab = users.seed(&ana, PlanTier::Premium, 5);
    let mut second_tab = first_tab.clone();
    let text = ScriptedText::default();
    let images = ScriptedImages::new(&["flux"], 0);
    let service = service(&text, &images, &users);

    service.generate(&mut first_tab, &submission()).await.expect("first");
    let outcome = service
        .generate(&mut second_tab, &submission())
        .await
        .expect("second");

    assert_eq!(outcome.usage.used, 7);
    assert_eq!(users.get(&ana.id).expect("row").images_used, 7);
}
