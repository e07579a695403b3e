use anyhow::{Context, Result};
use clap::Parser;
use replay_ingest::config::runtime::ProcessEnv;
use replay_ingest::config::{load_config, IngestConfig};
use replay_ingest::pipeline::Pipeline;
use replay_ingest::replay::{ingest, RecordingReader};
use replay_ingest::sink::{MemorySink, Sink, SqliteSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "replay-ingest", about = "Ingest a replay recording into a session database")]
struct Cli {
    /// Recording to ingest (.jsonl or .jsonl.gz)
    recording: PathBuf,
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// SQLite database path, overrides the configuration
    #[arg(long)]
    database: Option<String>,
    /// Run the full pipeline against an in-memory sink
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "replay_ingest=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => IngestConfig::default(),
    };
    config.apply_env(&ProcessEnv);
    if let Some(database) = cli.database {
        config.sink.database = database;
    }

    info!(
        recording = %cli.recording.display(),
        database = %config.sink.database,
        window_ticks = config.flush.window_ticks,
        dry_run = cli.dry_run,
        "Configuration loaded"
    );

    let sink: Arc<dyn Sink> = if cli.dry_run {
        Arc::new(MemorySink::new())
    } else {
        Arc::new(
            SqliteSink::new(&config.sink.database)
                .context("Failed to initialize session database")?,
        )
    };

    let mut reader = RecordingReader::open(&cli.recording)?;
    let pipeline = Pipeline::new(config, sink);
    let summary = ingest(&mut reader, pipeline).await?;

    info!(
        session_id = %summary.session_id,
        notifications = summary.notifications,
        updates_written = summary.updates_written,
        updates_dropped = summary.updates_dropped,
        events_written = summary.events_written,
        events_dropped = summary.events_dropped,
        skipped_positions = summary.skipped_positions,
        "Done"
    );

    Ok(())
}
