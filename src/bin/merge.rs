//! warcmap Merger Binary
//!
//! Merges shard containers from several batch runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use warcmap::counters::LoggingProgress;
use warcmap::{Config, Counters, MergeOrchestrator};

/// Merge shard containers
#[derive(Parser, Debug)]
#[command(name = "warcmap-merge")]
#[command(about = "Merge sorted shard containers into one store")]
#[command(version)]
struct Args {
    /// Input path pattern (containers, or batch directories with --batch)
    #[arg(short, long)]
    input: String,

    /// Output container (or output directory with --batch)
    #[arg(short, long)]
    output: PathBuf,

    /// Treat matches as batch directories and merge their shards by name
    #[arg(short, long)]
    batch: bool,

    /// Worker threads for parallel shard merges
    #[arg(short, long)]
    workers: Option<usize>,

    /// Liveness poll interval in seconds
    #[arg(long, default_value = "30")]
    liveness_secs: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,warcmap=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("warcmap merger v{}", warcmap::VERSION);
    tracing::info!(" - input:  {}", args.input);
    tracing::info!(" - output: {}", args.output.display());

    let mut builder = Config::builder().liveness_interval(Duration::from_secs(args.liveness_secs));
    if let Some(workers) = args.workers {
        builder = builder.workers(workers);
    }
    let config = builder.build();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let counters = Arc::new(Counters::new());
    let orchestrator = MergeOrchestrator::new(&config)
        .with_counters(counters.clone())
        .with_progress(Arc::new(LoggingProgress::new("merge", config.liveness_interval)));

    let result = if args.batch {
        orchestrator
            .merge_batches(&args.input, &args.output)
            .map(|stats| stats.iter().map(|s| s.entries_written).sum::<u64>())
    } else {
        orchestrator
            .merge_containers(&args.input, &args.output)
            .map(|stats| stats.entries_written)
    };

    match result {
        Ok(entries) => tracing::info!("Merge finished, {} entries written", entries),
        Err(e) => {
            tracing::error!("Merge failed: {}", e);
            std::process::exit(1);
        }
    }

    for (counter, value) in counters.snapshot() {
        tracing::info!("{:?} = {}", counter, value);
    }
}
