//! warcmap Generator Binary
//!
//! Builds a sharded store from WARC files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use warcmap::counters::LoggingProgress;
use warcmap::storage::Compression;
use warcmap::{Config, CorpusFormat, Counters, GenerateJob};

/// Generate a sharded store from WARC files
#[derive(Parser, Debug)]
#[command(name = "warcmap-generate")]
#[command(about = "Parse WARC files into partitioned, indexed record containers")]
#[command(version)]
struct Args {
    /// Prefix to use for UUID generation
    #[arg(short, long)]
    prefix: String,

    /// Input format: clueweb09, clueweb12 or commoncrawl
    #[arg(short, long)]
    format: String,

    /// Input file, directory or glob pattern
    #[arg(short, long)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Number of output partitions
    #[arg(short = 'k', long, default_value = "100")]
    partitions: u32,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip records larger than this many MB
    #[arg(long, default_value = "64")]
    max_record_mb: usize,

    /// Store values uncompressed
    #[arg(long)]
    no_compression: bool,

    /// Keep per-split staging output
    #[arg(long)]
    keep_staging: bool,
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

    let format: CorpusFormat = match args.format.parse() {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("warcmap generator v{}", warcmap::VERSION);
    tracing::info!(" - prefix: {}", args.prefix);
    tracing::info!(" - format: {}", format);
    tracing::info!(" - input:  {}", args.input);
    tracing::info!(" - output: {}", args.output.display());

    let mut builder = Config::builder()
        .uuid_prefix(&args.prefix)
        .format(format)
        .num_partitions(args.partitions)
        .max_record_bytes(args.max_record_mb * 1024 * 1024)
        .keep_staging(args.keep_staging);
    if let Some(workers) = args.workers {
        builder = builder.workers(workers);
    }
    if args.no_compression {
        builder = builder.compression(Compression::None);
    }
    let config = builder.build();

    let counters = Arc::new(Counters::new());
    let job = match GenerateJob::new(config) {
        Ok(job) => job
            .with_counters(counters.clone())
            .with_progress(Arc::new(LoggingProgress::new("generate", Duration::from_secs(30)))),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = job.run(&args.input, &args.output) {
        tracing::error!("Generation failed: {}", e);
        std::process::exit(1);
    }

    for (counter, value) in counters.snapshot() {
        tracing::info!("{:?} = {}", counter, value);
    }
}
