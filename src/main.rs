// Seispick command line
// Refines one event onset of a WAV record and stores the accepted pick

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::TryCurrentError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use seispick_lib::estimation::{AicPicker, Worker};
use seispick_lib::pipeline::TraceWriter;
use seispick_lib::record::{ingest_wav, RecordError};
use seispick_lib::session::{CommitOutcome, RefinementSession, SessionError};
use seispick_lib::state::{
    init_db, init_default_db, DbError, Document, SettingsError, SettingsFile,
};

const USAGE: &str = "usage: seispick <record.wav> <t_start_secs> <t_end_secs> \
[--event <uuid>] [--db <path>] [--settings <path>] [--plot <out.json>] \
[--trace <out.jsonl>] [--dry-run]";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("Plot serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No async runtime: {0}")]
    Runtime(#[from] TryCurrentError),
    #[error("Event {0} not found for this record")]
    UnknownEvent(Uuid),
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    record: PathBuf,
    t_start: f64,
    t_end: f64,
    event: Option<Uuid>,
    db: Option<PathBuf>,
    settings: Option<PathBuf>,
    plot: Option<PathBuf>,
    trace: Option<PathBuf>,
    dry_run: bool,
}

fn parse_seconds(name: &str, value: Option<String>) -> Result<f64, CliError> {
    let value = value.ok_or_else(|| CliError::Usage(format!("missing {}", name)))?;
    value
        .parse()
        .map_err(|_| CliError::Usage(format!("{} must be a number, got {:?}", name, value)))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, CliError> {
    let record = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| CliError::Usage("missing record path".to_string()))?;
    let t_start = parse_seconds("t_start_secs", args.next())?;
    let t_end = parse_seconds("t_end_secs", args.next())?;

    let mut parsed = Args {
        record,
        t_start,
        t_end,
        ..Args::default()
    };

    while let Some(flag) = args.next() {
        if flag == "--dry-run" {
            parsed.dry_run = true;
            continue;
        }

        let value = args
            .next()
            .ok_or_else(|| CliError::Usage(format!("{} needs a value", flag)))?;
        match flag.as_str() {
            "--event" => {
                let id = Uuid::parse_str(&value)
                    .map_err(|_| CliError::Usage(format!("invalid event id {:?}", value)))?;
                parsed.event = Some(id);
            }
            "--db" => parsed.db = Some(PathBuf::from(value)),
            "--settings" => parsed.settings = Some(PathBuf::from(value)),
            "--plot" => parsed.plot = Some(PathBuf::from(value)),
            "--trace" => parsed.trace = Some(PathBuf::from(value)),
            _ => return Err(CliError::Usage(format!("unknown option {}", flag))),
        }
    }

    Ok(parsed)
}

async fn run(args: Args) -> Result<(), CliError> {
    let data = tokio::fs::read(&args.record).await?;
    let name = args
        .record
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.record.display().to_string());
    let record = Arc::new(ingest_wav(&name, &data)?);
    log::info!(
        "Loaded {}: {} samples at {} Hz",
        record.name(),
        record.len(),
        record.sample_rate()
    );

    let db = match &args.db {
        Some(path) => init_db(path)?,
        None => init_default_db()?,
    };
    let mut document = Document::open(db, &record)?;

    let event = match args.event {
        Some(id) => Some(document.event(&id)?.ok_or(CliError::UnknownEvent(id))?),
        None => None,
    };

    let settings = match &args.settings {
        Some(path) => SettingsFile::load(path)?,
        None => SettingsFile::load_default()?,
    };

    let mut session = RefinementSession::open(
        Arc::clone(&record),
        Arc::new(AicPicker::new()),
        args.t_start,
        args.t_end,
        event,
        &settings,
    )?;
    let window = session.window();
    log::info!("Analysis window [{}, {})", window.start(), window.end());

    let mut worker = Worker::current()?;
    if let Some(path) = &args.trace {
        worker = worker.with_trace(TraceWriter::new(path.clone()));
    }

    session.start_estimation(&worker)?;
    session.wait().await?;
    println!("{}", session.label());

    if let Some(path) = &args.plot {
        if let Some(plot) = session.last_plot() {
            tokio::fs::write(path, plot.to_json()?).await?;
            log::info!("Wrote AIC plot data to {:?}", path);
        }
    }

    if args.dry_run {
        session.reject();
        println!("Dry run, document left unchanged");
        return Ok(());
    }

    match session.accept(&mut document)? {
        CommitOutcome::Created(event) => {
            println!("Created event {} at sample {}", event.id, event.time)
        }
        CommitOutcome::Edited(event) => {
            println!("Moved event {} to sample {}", event.id, event.time)
        }
        CommitOutcome::Unchanged => println!("Event unchanged"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seispick=info,seispick_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match parse_args(std::env::args().skip(1)) {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        if matches!(e, CliError::Usage(_)) {
            eprintln!("{}", USAGE);
        }
        std::process::exit(1);
    }
}
