use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use plan_align::{
    AlignmentTransform, PickEvent, RecordId,
    notify::{MemoryNotifier, Notifier, OutboxNotifier},
    read_state::load,
    session::{AlignmentSession, EventOutcome},
    store::{JsonFileStore, MemoryStore, RecordStore},
};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Newline-delimited JSON pick script
    #[arg(short, long)]
    events: PathBuf,
    /// Record that owns the alignment
    #[arg(short, long)]
    record: Option<String>,
    #[arg(short, long, default_value = "alignment-store.json")]
    store: PathBuf,
    #[arg(short, long, default_value = "alignment-notifications.jsonl")]
    notify: PathBuf,
    /// Real-world distance between the first two 3D points
    #[arg(short = 'd', long)]
    real_distance: Option<f64>,
    #[arg(short, long, default_value = "feet")]
    unit: String,
    /// Keep results in memory instead of writing files
    #[arg(long)]
    dry_run: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    record_id: Option<RecordId>,
    paired_points: usize,
    transform: Option<AlignmentTransform<f64>>,
    residuals: Vec<(char, f64)>,
    scale_factor: Option<f64>,
    finalized: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    if args.dry_run {
        run(&args, &MemoryStore::default(), &MemoryNotifier::default()).await
    } else {
        let store = JsonFileStore::new(&args.store);
        let notifier = OutboxNotifier::new(&args.notify);
        run(&args, &store, &notifier).await
    }
}

async fn run<S: RecordStore, N: Notifier>(args: &Cli, store: &S, notifier: &N) -> Result<()> {
    let events = load(&args.events)
        .await
        .with_context(|| format!("reading {}", args.events.display()))?;

    let mut session = AlignmentSession::<f64>::new();
    if let Some(record) = &args.record {
        session.set_record(RecordId::new(record.as_str()));
    }

    let outcomes = session
        .replay(&events, &args.unit, store, notifier)
        .await
        .context("replaying pick script")?;
    let mut scale_factor = outcomes.iter().rev().find_map(|outcome| match outcome {
        EventOutcome::Calibrated(scale) => Some(*scale),
        _ => None,
    });

    if let Some(distance) = args.real_distance {
        let event = PickEvent::Calibrate { distance };
        match session.apply(&event, &args.unit, store, notifier).await {
            Ok(EventOutcome::Calibrated(scale)) => scale_factor = Some(scale),
            Ok(outcome) => warn!("unexpected outcome {outcome:?}"),
            Err(error) if error.is_recoverable() => warn!("calibration failed: {error}"),
            Err(error) => return Err(error).context("calibrating scale"),
        }
    }

    let summary = Summary {
        record_id: session.record().cloned(),
        paired_points: session.collector().paired_count(),
        transform: session.transform().copied(),
        residuals: session
            .residuals()
            .unwrap_or_default()
            .into_iter()
            .map(|(label, distance)| (label.as_char(), distance))
            .collect(),
        scale_factor,
        finalized: session.is_finalized(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
