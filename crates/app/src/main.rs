use std::fmt;
use std::path::PathBuf;

use revise_core::model::{
    LearnerId, LearnerIdentity, MnemonicStyle, PlannedSessionId, StepKey, StepPayload,
};
use services::steps::{CompleteSubmission, ConfidenceLevel, PreviewStep};
use services::{AppServices, AudioClip, Clock, ReviseConfig, SessionRunEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingPlan,
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidStep { raw: String },
    InvalidStyle { raw: String },
    InvalidConfidence { raw: String },
    InvalidPatch { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingPlan => write!(f, "a planned session id is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStep { raw } => write!(f, "unknown step: {raw}"),
            ArgsError::InvalidStyle { raw } => write!(f, "unknown mnemonic style: {raw}"),
            ArgsError::InvalidConfidence { raw } => write!(f, "invalid --confidence value: {raw}"),
            ArgsError::InvalidPatch { raw } => write!(f, "patch must be a JSON object: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  revise status   <planned-id> [options]");
    eprintln!("  revise preview  <planned-id> --confidence <level> [--social-media-off] [options]");
    eprintln!("  revise patch    <planned-id> <step> <json-object> [options]");
    eprintln!("  revise advance  <planned-id> [options]");
    eprintln!("  revise mnemonic <planned-id> --style <rap|pop|rock> [options]");
    eprintln!("  revise finish   <planned-id> [--confidence <level>] [--note <text>] [--audio <file>] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite://revise.sqlite3)");
    eprintln!("  --learner <id>      Learner id (default: owner of the planned session)");
    eprintln!();
    eprintln!("Confidence levels: very_confident, fairly_confident, bit_unsure, need_help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REVISE_DB_URL, REVISE_LEARNER_ID, REVISE_LEVEL, REVISE_EXAM_BOARD,");
    eprintln!("  REVISE_MNEMONIC_URL, REVISE_MNEMONIC_API_KEY, REVISE_MNEMONIC_CALLBACK_URL,");
    eprintln!("  REVISE_MNEMONIC_SERVER_TRACKING, REVISE_AUDIO_DIR, REVISE_AUDIO_PUBLIC_URL, RUST_LOG");
}

#[derive(Debug, Clone)]
enum Command {
    Status,
    Preview {
        confidence: Option<ConfidenceLevel>,
        social_media_off: bool,
    },
    Patch {
        step: StepKey,
        patch: StepPayload,
    },
    Advance,
    Mnemonic {
        style: MnemonicStyle,
    },
    Finish {
        confidence: Option<ConfidenceLevel>,
        note: Option<String>,
        audio: Option<PathBuf>,
    },
}

struct Args {
    command: Command,
    plan: PlannedSessionId,
    db_url: Option<String>,
    learner: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(name) = args.next() else {
            return Ok(None);
        };
        if matches!(name.as_str(), "--help" | "-h" | "help") {
            return Ok(None);
        }
        let plan = args
            .next()
            .and_then(|raw| PlannedSessionId::new(raw).ok())
            .ok_or(ArgsError::MissingPlan)?;

        let mut positional = Vec::new();
        let mut db_url = None;
        let mut learner = None;
        let mut confidence = None;
        let mut social_media_off = false;
        let mut style = None;
        let mut note = None;
        let mut audio = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                "--learner" => learner = Some(require_value(&mut args, "--learner")?),
                "--confidence" => {
                    let value = require_value(&mut args, "--confidence")?;
                    confidence = Some(parse_confidence(&value)?);
                }
                "--social-media-off" => social_media_off = true,
                "--style" => {
                    let value = require_value(&mut args, "--style")?;
                    style = Some(
                        value
                            .parse::<MnemonicStyle>()
                            .map_err(|_| ArgsError::InvalidStyle { raw: value.clone() })?,
                    );
                }
                "--note" => note = Some(require_value(&mut args, "--note")?),
                "--audio" => audio = Some(PathBuf::from(require_value(&mut args, "--audio")?)),
                other if other.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let command = match name.as_str() {
            "status" => Command::Status,
            "advance" => Command::Advance,
            "preview" => Command::Preview {
                confidence,
                social_media_off,
            },
            "mnemonic" => Command::Mnemonic {
                style: style.ok_or(ArgsError::MissingValue { flag: "--style" })?,
            },
            "finish" => Command::Finish {
                confidence,
                note,
                audio,
            },
            "patch" => {
                let mut positional = positional.drain(..);
                let raw_step = positional.next().ok_or(ArgsError::MissingValue { flag: "<step>" })?;
                let step = raw_step
                    .parse::<StepKey>()
                    .map_err(|_| ArgsError::InvalidStep { raw: raw_step.clone() })?;
                let raw_patch = positional
                    .next()
                    .ok_or(ArgsError::MissingValue { flag: "<json-object>" })?;
                let patch = serde_json::from_str(&raw_patch)
                    .ok()
                    .and_then(|value| StepPayload::from_value(value).ok())
                    .ok_or(ArgsError::InvalidPatch { raw: raw_patch })?;
                Command::Patch { step, patch }
            }
            _ => return Err(ArgsError::UnknownArg(name)),
        };
        if !matches!(command, Command::Patch { .. })
            && let Some(extra) = positional.into_iter().next()
        {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self {
            command,
            plan,
            db_url,
            learner,
        }))
    }
}

fn parse_confidence(raw: &str) -> Result<ConfidenceLevel, ArgsError> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string()))
        .map_err(|_| ArgsError::InvalidConfidence { raw: raw.to_string() })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn print_status(engine: &SessionRunEngine) {
    let Some(overview) = engine.overview() else {
        return;
    };
    println!(
        "{} / {} ({} min) for {}",
        overview.subject_name, overview.topic_name, overview.duration_minutes, overview.learner_name
    );
    println!("session {}", overview.revision_session_id);
    for key in StepKey::ALL {
        let marker = if key == engine.current_step() { ">" } else { " " };
        let status = engine
            .record(key)
            .map_or("not_started", |r| r.status.as_str());
        println!("{marker} {}. {:<10} {status}", key.rank(), key.label());
    }
    if engine.is_finished() {
        println!("all steps completed");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let mut config = ReviseConfig::from_env()?;
    if let Some(db_url) = parsed.db_url {
        config.db_url = db_url;
    }
    config.db_url = normalize_sqlite_url(config.db_url);
    prepare_sqlite_file(&config.db_url)?;

    let services = AppServices::new_sqlite(&config, Clock::default_clock()).await?;
    tracing::info!(db = %config.db_url, plan = %parsed.plan, "opened revision store");
    let mut engine = services.engine();
    engine.load_session(&parsed.plan).await?;

    let learner_id = match parsed.learner.or(config.learner_id) {
        Some(raw) => LearnerId::new(raw)?,
        None => engine
            .overview()
            .map(|o| o.learner_id.clone())
            .ok_or(services::EngineError::NotLoaded)?,
    };
    let learner = LearnerIdentity::new(learner_id);

    match parsed.command {
        Command::Status => {}
        Command::Preview {
            confidence,
            social_media_off,
        } => {
            PreviewStep::start(&mut engine, confidence, social_media_off).await?;
        }
        Command::Patch { step, patch } => {
            engine.patch_step(step, patch).await?;
            println!("{}", engine.payload(step).into_value());
        }
        Command::Advance => {
            engine.advance_step().await?;
        }
        Command::Mnemonic { style } => {
            let mut summary = services.summary_step(learner);
            summary.restore(&engine)?;
            let mnemonic = summary.select_style(&mut engine, style).await?;
            println!("{} mnemonic: {:?}", mnemonic.style(), mnemonic.status());
            if !mnemonic.lyrics().is_empty() {
                println!("{}", mnemonic.lyrics());
            }
            if let Some(url) = mnemonic.audio_url() {
                println!("audio: {url}");
            }
        }
        Command::Finish {
            confidence,
            note,
            audio,
        } => {
            let audio = match audio {
                Some(path) => Some(AudioClip::new(tokio::fs::read(&path).await?)),
                None => None,
            };
            let outcome = services
                .complete_step(learner)
                .finish(
                    &mut engine,
                    CompleteSubmission {
                        post_confidence: confidence,
                        journal_note: note,
                        audio,
                    },
                )
                .await?;
            if let Some(audio) = outcome.audio {
                println!("voice note stored at {}", audio.url);
            }
            if outcome.reflection_written {
                println!("reflection saved");
            }
        }
    }

    print_status(&engine);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revise=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
