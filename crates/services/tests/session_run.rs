mod support;

use std::sync::Arc;

use revise_core::model::{StepKey, StepPayload, StepStatus};
use revise_core::time::fixed_clock;
use serde_json::json;
use services::session_run::{FINISH_ERROR_MESSAGE, LOAD_ERROR_MESSAGE};
use services::{EngineError, RunPhase, SessionRunEngine};
use storage::repository::{InMemoryRepository, PlannedSessionRepository};

use support::{FlakyRevisions, planned};

async fn seeded() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.upsert_planned_session(&planned("ps-bio", "Biology", "Photosynthesis"))
        .await
        .unwrap();
    repo
}

fn plan_id() -> revise_core::model::PlannedSessionId {
    planned("ps-bio", "Biology", "Photosynthesis").id
}

#[tokio::test]
async fn reload_resumes_after_completed_steps() {
    for completed in 0..=6u8 {
        let repo = seeded().await;
        let mut engine = SessionRunEngine::new(Arc::new(repo.clone()), fixed_clock());
        engine.load_session(&plan_id()).await.unwrap();
        for _ in 0..completed {
            engine.advance_step().await.unwrap();
        }

        let mut reloaded = SessionRunEngine::new(Arc::new(repo), fixed_clock());
        reloaded.load_session(&plan_id()).await.unwrap();
        assert_eq!(
            reloaded.current_index(),
            (completed + 1).min(6),
            "after {completed} completed steps"
        );
        assert_eq!(reloaded.is_finished(), completed == 6);
    }
}

#[tokio::test]
async fn loading_twice_reuses_the_session() {
    let repo = seeded().await;
    let mut first = SessionRunEngine::new(Arc::new(repo.clone()), fixed_clock());
    let mut second = SessionRunEngine::new(Arc::new(repo.clone()), fixed_clock());
    first.load_session(&plan_id()).await.unwrap();
    second.load_session(&plan_id()).await.unwrap();

    assert_eq!(repo.revision_session_count().unwrap(), 1);
    assert_eq!(
        first.overview().unwrap().revision_session_id,
        second.overview().unwrap().revision_session_id
    );
}

#[tokio::test]
async fn patches_merge_and_survive_reload() {
    let repo = seeded().await;
    let mut engine = SessionRunEngine::new(Arc::new(repo.clone()), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();

    engine
        .patch_step(StepKey::Preview, StepPayload::new().with("pre_confidence", "bit_unsure"))
        .await
        .unwrap();
    engine
        .patch_step(StepKey::Preview, StepPayload::new().with("social_media_off", true))
        .await
        .unwrap();
    engine
        .patch_step(
            StepKey::Preview,
            StepPayload::new().with("pre_confidence", "fairly_confident"),
        )
        .await
        .unwrap();

    let mut reloaded = SessionRunEngine::new(Arc::new(repo), fixed_clock());
    reloaded.load_session(&plan_id()).await.unwrap();
    let payload = reloaded.payload(StepKey::Preview);
    assert_eq!(payload.get("pre_confidence"), Some(&json!("fairly_confident")));
    assert_eq!(payload.get("social_media_off"), Some(&json!(true)));
    assert_eq!(
        reloaded.record(StepKey::Preview).unwrap().status,
        StepStatus::InProgress
    );
}

#[tokio::test]
async fn failed_reload_keeps_previous_state() {
    let flaky = Arc::new(FlakyRevisions::over(seeded().await));
    let mut engine = SessionRunEngine::new(flaky.clone(), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();
    engine.advance_step().await.unwrap();

    FlakyRevisions::set(&flaky.fail_load, true);
    let err = engine.load_session(&plan_id()).await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(engine.error(), Some(LOAD_ERROR_MESSAGE));
    assert!(!engine.is_loading());
    assert_eq!(engine.current_step(), StepKey::Recall);
    assert!(engine.overview().is_some());

    FlakyRevisions::set(&flaky.fail_load, false);
    engine.load_session(&plan_id()).await.unwrap();
    assert_eq!(engine.error(), None);
    assert_eq!(engine.current_step(), StepKey::Recall);
}

#[tokio::test]
async fn failed_first_load_has_no_session() {
    let flaky = Arc::new(FlakyRevisions::over(seeded().await));
    FlakyRevisions::set(&flaky.fail_load, true);
    let mut engine = SessionRunEngine::new(flaky, fixed_clock());

    assert!(engine.load_session(&plan_id()).await.is_err());
    assert_eq!(engine.phase(), RunPhase::Loading);
    assert!(engine.overview().is_none());
    assert_eq!(engine.error(), Some(LOAD_ERROR_MESSAGE));
}

#[tokio::test]
async fn failed_patch_stays_local_and_unsaved() {
    let flaky = Arc::new(FlakyRevisions::over(seeded().await));
    let mut engine = SessionRunEngine::new(flaky.clone(), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();

    FlakyRevisions::set(&flaky.fail_patch, true);
    let err = engine
        .patch_step(StepKey::Preview, StepPayload::new().with("social_media_off", true))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Persist { key: StepKey::Preview, .. }));
    assert_eq!(
        engine.payload(StepKey::Preview).get("social_media_off"),
        Some(&json!(true))
    );
    assert_eq!(engine.unsaved_steps(), vec![StepKey::Preview]);
    assert!(!engine.is_saving());

    FlakyRevisions::set(&flaky.fail_patch, false);
    engine
        .patch_step(StepKey::Preview, StepPayload::new().with("social_media_off", true))
        .await
        .unwrap();
    assert!(engine.unsaved_steps().is_empty());
}

#[tokio::test]
async fn failed_advance_does_not_move_the_pointer() {
    let flaky = Arc::new(FlakyRevisions::over(seeded().await));
    let mut engine = SessionRunEngine::new(flaky.clone(), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();

    FlakyRevisions::set(&flaky.fail_advance, true);
    let err = engine.advance_step().await.unwrap_err();
    assert!(matches!(err, EngineError::Persist { key: StepKey::Preview, .. }));
    assert_eq!(engine.current_step(), StepKey::Preview);
    assert_eq!(
        engine.record(StepKey::Preview).unwrap().status,
        StepStatus::InProgress
    );

    FlakyRevisions::set(&flaky.fail_advance, false);
    assert_eq!(engine.advance_step().await.unwrap(), StepKey::Recall);
}

#[tokio::test]
async fn failed_finish_keeps_the_run_active() {
    let flaky = Arc::new(FlakyRevisions::over(seeded().await));
    let mut engine = SessionRunEngine::new(flaky.clone(), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();
    for _ in 0..6 {
        engine.advance_step().await.unwrap();
    }

    FlakyRevisions::set(&flaky.fail_finish, true);
    assert!(engine.finish_session().await.is_err());
    assert_eq!(engine.error(), Some(FINISH_ERROR_MESSAGE));
    assert_eq!(engine.phase(), RunPhase::Active);

    FlakyRevisions::set(&flaky.fail_finish, false);
    engine.finish_session().await.unwrap();
    assert_eq!(engine.phase(), RunPhase::Exited);
}

#[tokio::test]
async fn go_back_then_advance_never_skips_a_step() {
    let repo = seeded().await;
    let mut engine = SessionRunEngine::new(Arc::new(repo), fixed_clock());
    engine.load_session(&plan_id()).await.unwrap();
    engine.advance_step().await.unwrap();
    engine.advance_step().await.unwrap();
    assert_eq!(engine.current_step(), StepKey::Reinforce);

    engine.go_back();
    assert_eq!(engine.current_step(), StepKey::Recall);
    assert_eq!(engine.advance_step().await.unwrap(), StepKey::Reinforce);
}
