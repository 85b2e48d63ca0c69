mod support;

use revise_core::model::{MnemonicStyle, StepKey};
use revise_core::time::fixed_clock;
use services::config::{AudioConfig, DEFAULT_LEVEL, ReviseConfig};
use services::steps::{CompleteSubmission, ConfidenceLevel, PreviewStep};
use services::{AppServices, AudioClip, RunPhase};
use storage::repository::{MnemonicRequestStatus, PlannedSessionRepository};
use tempfile::TempDir;
use url::Url;

use support::{learner, planned};

fn config(dir: &TempDir) -> ReviseConfig {
    let audio_root = dir.path().join("voice-notes");
    ReviseConfig {
        db_url: format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("revise.sqlite3").display()
        ),
        learner_id: None,
        level: DEFAULT_LEVEL.to_string(),
        exam_board: None,
        mnemonic: None,
        server_tracking: false,
        audio: AudioConfig {
            public_base: Url::from_directory_path(&audio_root).unwrap(),
            root: audio_root,
        },
    }
}

#[tokio::test]
async fn sqlite_backed_run_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let plan = planned("ps-bio", "Biology", "Photosynthesis");

    let services = AppServices::new_sqlite(&config, fixed_clock()).await.unwrap();
    services
        .planned_sessions()
        .upsert_planned_session(&plan)
        .await
        .unwrap();
    let mut engine = services.engine();
    engine.load_session(&plan.id).await.unwrap();
    PreviewStep::start(&mut engine, Some(ConfidenceLevel::NeedHelp), true)
        .await
        .unwrap();
    drop(engine);
    drop(services);

    let services = AppServices::new_sqlite(&config, fixed_clock()).await.unwrap();
    let mut engine = services.engine();
    engine.load_session(&plan.id).await.unwrap();
    assert_eq!(engine.current_step(), StepKey::Recall);
    assert_eq!(
        PreviewStep::current(&engine).unwrap().pre_confidence,
        Some(ConfidenceLevel::NeedHelp)
    );
}

#[tokio::test]
async fn unconfigured_generator_yields_a_failed_mnemonic() {
    let dir = TempDir::new().unwrap();
    let services = AppServices::new_sqlite(&config(&dir), fixed_clock())
        .await
        .unwrap();
    let plan = planned("ps-chem", "Chemistry", "Ionic Bonding");
    services
        .planned_sessions()
        .upsert_planned_session(&plan)
        .await
        .unwrap();
    let mut engine = services.engine();
    engine.load_session(&plan.id).await.unwrap();

    let mut summary = services.summary_step(learner());
    let mnemonic = summary
        .select_style(&mut engine, MnemonicStyle::Rap)
        .await
        .unwrap();
    assert!(mnemonic.is_failed());
    assert_eq!(mnemonic.style(), MnemonicStyle::Rap);

    let request = summary.request_id().cloned().unwrap();
    let record = services.tracker().poll(&request).await.unwrap();
    assert!(matches!(record.status, MnemonicRequestStatus::Failed));
    assert!(record.error_message.is_some());
}

#[tokio::test]
async fn voice_note_lands_on_disk() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let services = AppServices::new_sqlite(&config, fixed_clock()).await.unwrap();
    let plan = planned("ps-hist", "History", "The Cold War");
    services
        .planned_sessions()
        .upsert_planned_session(&plan)
        .await
        .unwrap();
    let mut engine = services.engine();
    engine.load_session(&plan.id).await.unwrap();
    for _ in 0..5 {
        engine.advance_step().await.unwrap();
    }

    let outcome = services
        .complete_step(learner())
        .finish(
            &mut engine,
            CompleteSubmission {
                post_confidence: Some(ConfidenceLevel::VeryConfident),
                journal_note: Some("Truman doctrine first".into()),
                audio: Some(AudioClip::new(vec![1, 2, 3, 4]).with_duration(3)),
            },
        )
        .await
        .unwrap();

    let audio = outcome.audio.unwrap();
    let on_disk = std::fs::read(config.audio.root.join(&audio.path)).unwrap();
    assert_eq!(on_disk, vec![1, 2, 3, 4]);
    assert_eq!(audio.url.scheme(), "file");
    assert!(outcome.reflection_written);
    assert_eq!(engine.phase(), RunPhase::Exited);
}
