use std::fmt;

use chrono::{DateTime, Duration, Utc};
use revise_core::model::{LearnerId, PlannedSession, PlannedSessionId, SubjectId, TopicId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    learner_id: String,
    learner_name: String,
    sessions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSessions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidLearner { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLearner { raw } => write!(f, "invalid --learner value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("REVISE_DB_URL").unwrap_or_else(|_| "sqlite://revise.sqlite3".into());
        let mut learner_id =
            std::env::var("REVISE_LEARNER_ID").unwrap_or_else(|_| "learner-1".into());
        let mut learner_name = std::env::var("REVISE_LEARNER_NAME").unwrap_or_else(|_| "Sam".into());
        let mut sessions = std::env::var("REVISE_SEED_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--learner" => {
                    let value = require_value(&mut args, "--learner")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidLearner { raw: value });
                    }
                    learner_id = value;
                }
                "--learner-name" => {
                    learner_name = require_value(&mut args, "--learner-name")?;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            learner_id,
            learner_name,
            sessions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://revise.sqlite3)");
    eprintln!("  --learner <id>            Learner id owning the sessions (default: learner-1)");
    eprintln!("  --learner-name <name>     Learner display name (default: Sam)");
    eprintln!("  --sessions <n>            Number of planned sessions to upsert (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  REVISE_DB_URL, REVISE_LEARNER_ID, REVISE_LEARNER_NAME, REVISE_SEED_SESSIONS"
    );
}

// (subject id, subject name, icon, colour, topic id, topic name)
const SAMPLES: [(&str, &str, &str, &str, &str, &str); 4] = [
    ("biology", "Biology", "leaf", "#2e7d32", "photosynthesis", "Photosynthesis"),
    ("chemistry", "Chemistry", "flask", "#6a1b9a", "ionic-bonding", "Ionic Bonding"),
    ("history", "History", "landmark", "#8d6e63", "cold-war", "The Cold War"),
    ("english-literature", "English Literature", "book", "#1565c0", "macbeth", "Macbeth"),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let learner_id = LearnerId::new(args.learner_id.clone())?;

    for i in 0..args.sessions {
        let idx = (i as usize) % SAMPLES.len();
        let (subject_id, subject_name, icon, color, topic_id, topic_name) = SAMPLES[idx];
        let planned = PlannedSession {
            id: PlannedSessionId::new(format!("ps-{}", i + 1))?,
            learner_id: learner_id.clone(),
            learner_name: args.learner_name.clone(),
            subject_id: SubjectId::new(subject_id)?,
            subject_name: subject_name.into(),
            subject_icon: Some(icon.into()),
            subject_color: Some(color.into()),
            topic_id: TopicId::new(topic_id)?,
            topic_name: topic_name.into(),
            duration_minutes: 20,
            scheduled_for: (now + Duration::days(i64::from(i))).date_naive(),
        };
        storage.planned_sessions.upsert_planned_session(&planned).await?;
    }

    println!(
        "Seeded {} planned sessions for {} into {}",
        args.sessions, learner_id, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
