mod practice;
mod seed;

use std::fmt;
use std::sync::Arc;

use prep_core::model::{ExamId, SessionConfig, SubjectId};
use services::{
    AnswerEvaluator, AnswerKeyEvaluator, ApiClient, ApiConfig, Clock, QuestionSource,
    RepositoryQuestions, SessionHistoryService, SessionLoopService,
};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

const DEFAULT_EXAM: &str = "enem";
const DEFAULT_SUBJECT: &str = "math";
const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
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
    eprintln!("  prep [practice] [--db <sqlite_url>] [--exam <id>] [--subject <id>]");
    eprintln!("                  [--query <questions=..&difficulty=..&timeLimit=..&mode=..>]");
    eprintln!("                  [--api <base_url>] [--shuffle]");
    eprintln!("  prep seed       [--db <sqlite_url>] [--exam <id>] [--subject <id>]");
    eprintln!("  prep history    [--db <sqlite_url>] [--exam <id>] [--subject <id>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:prep.sqlite3");
    eprintln!("  --exam {DEFAULT_EXAM} --subject {DEFAULT_SUBJECT}");
    eprintln!("  --query questions=20&difficulty=mixed&timeLimit=unlimited&mode=practice");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_DB_URL, PREP_EXAM_ID, PREP_SUBJECT_ID, PREP_API_URL, PREP_API_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Seed,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "seed" => Some(Self::Seed),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    exam_id: ExamId,
    subject_id: SubjectId,
    config: SessionConfig,
    api_url: Option<String>,
    shuffle: bool,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let mut parsed = Self {
            db_url: env("PREP_DB_URL")
                .map_or_else(|| "sqlite://prep.sqlite3".into(), normalize_sqlite_url),
            exam_id: ExamId::new(env("PREP_EXAM_ID").unwrap_or_else(|| DEFAULT_EXAM.into())),
            subject_id: SubjectId::new(
                env("PREP_SUBJECT_ID").unwrap_or_else(|| DEFAULT_SUBJECT.into()),
            ),
            config: SessionConfig::default(),
            api_url: None,
            shuffle: false,
            limit: DEFAULT_HISTORY_LIMIT,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--exam" => parsed.exam_id = ExamId::new(require_value(args, "--exam")?),
                "--subject" => {
                    parsed.subject_id = SubjectId::new(require_value(args, "--subject")?);
                }
                "--query" => {
                    parsed.config = SessionConfig::from_query(&require_value(args, "--query")?);
                }
                "--api" => parsed.api_url = Some(require_value(args, "--api")?),
                "--shuffle" => parsed.shuffle = true,
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means practice.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Practice,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Practice,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Practice => practice(&parsed, &storage).await,
        Command::Seed => {
            let records = seed::sample_records(&parsed.exam_id, &parsed.subject_id)?;
            for record in &records {
                storage.questions.upsert_question(record).await?;
            }
            tracing::info!(
                exam = %parsed.exam_id,
                subject = %parsed.subject_id,
                count = records.len(),
                "seeded sample questions"
            );
            Ok(())
        }
        Command::History => {
            let history = SessionHistoryService::new(Arc::clone(&storage.session_summaries));
            let items = history
                .list_recent(&parsed.exam_id, &parsed.subject_id, parsed.limit)
                .await?;
            if items.is_empty() {
                println!("no sessions yet for {}/{}", parsed.exam_id, parsed.subject_id);
            }
            for item in items {
                println!(
                    "#{:<4} {}  {}/{} ({} answered)  {}",
                    item.id,
                    item.completed_at.format("%Y-%m-%d %H:%M"),
                    item.score,
                    item.total,
                    item.answered,
                    item.reason.as_str()
                );
            }
            Ok(())
        }
    }
}

async fn practice(args: &Args, storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let (questions, evaluator) = match ApiConfig::from_env(args.api_url.clone()) {
        Some(config) => {
            let client = Arc::new(ApiClient::new(config));
            tracing::info!(api = %client.config().base_url, "using remote exam api");
            let questions: Arc<dyn QuestionSource> = client.clone();
            let evaluator: Arc<dyn AnswerEvaluator> = client;
            (questions, evaluator)
        }
        None => {
            let questions: Arc<dyn QuestionSource> =
                Arc::new(RepositoryQuestions::new(Arc::clone(&storage.questions)));
            let evaluator: Arc<dyn AnswerEvaluator> =
                Arc::new(AnswerKeyEvaluator::new(Arc::clone(&storage.questions)));
            (questions, evaluator)
        }
    };

    let loop_svc = SessionLoopService::new(
        Clock::system(),
        questions,
        Arc::clone(&storage.session_summaries),
        evaluator,
    )
    .with_shuffle(args.shuffle);

    tracing::info!(query = %args.config.to_query(), "starting session");
    let session = loop_svc
        .start_session(args.exam_id.clone(), args.subject_id.clone(), args.config)
        .await?;

    match practice::run_session(&loop_svc, session).await? {
        Some(summary) => practice::print_summary(&summary),
        None => println!("session left unfinished; nothing was saved"),
    }
    Ok(())
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
