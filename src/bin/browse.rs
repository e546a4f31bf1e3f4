//! warcmap Browser Binary
//!
//! Looks up a single record in a sharded store.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;
use warcmap::partition::OutputStream;
use warcmap::{LookupKey, ShardStore};

/// Browse a sharded store
#[derive(Parser, Debug)]
#[command(name = "warcmap-browse")]
#[command(about = "Print a record from a sharded store")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long)]
    input: PathBuf,

    /// Number of partitions the store was built with
    #[arg(short = 'k', long)]
    partitions: u32,

    /// UUID name prefix (required if --uuid is not set)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Internal record ID, or the URI with --uri
    #[arg(short, long)]
    name: Option<String>,

    /// UUID of the record
    #[arg(short, long)]
    uuid: Option<String>,

    /// Resolve --name through the URI shards
    #[arg(short = 'l', long)]
    uri: bool,

    /// Print only the record
    #[arg(short, long)]
    record_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Records go to stdout; keep logging quiet unless asked
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    let key = match lookup_key(&args) {
        Ok(key) => key,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let store = match ShardStore::open(&args.input, args.partitions) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let hit = match store.find(&key) {
        Ok(Some(hit)) => hit,
        Ok(None) => {
            let (stream, raw) = match &key {
                LookupKey::Uri(uri) => (OutputStream::Uri, uri.clone()),
                LookupKey::Uuid(uuid) => (OutputStream::Data, uuid.to_string()),
                LookupKey::Name { prefix, name } => (
                    OutputStream::Data,
                    warcmap::generate_id(prefix, name).to_string(),
                ),
            };
            eprintln!(
                "No record found for '{}' ({}, part={}, mapfile={})",
                raw,
                key,
                store.partition(&raw),
                store.container_path(stream, store.partition(&raw)).display()
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Lookup failed: {}", e);
            std::process::exit(1);
        }
    };

    if args.record_only {
        println!("{}", hit.record);
    } else if args.verbose {
        println!(
            "UUID={}\nPART={:05}\nMAPFILE={}\n\n--- RECORD BEGIN ---\n{}\n--- RECORD END ---",
            hit.uuid,
            hit.partition,
            hit.container.display(),
            hit.record
        );
    } else {
        println!("{}\n{}", hit.uuid, hit.record);
    }
}

/// Validate the flag combination and build the lookup key
fn lookup_key(args: &Args) -> Result<LookupKey, String> {
    if args.uri {
        let Some(name) = &args.name else {
            return Err("You need to specify --name when --uri is set.".to_string());
        };
        if args.prefix.is_some() {
            eprintln!("WARNING: --uri given, ignoring --prefix.");
        }
        return Ok(LookupKey::Uri(name.clone()));
    }

    if let Some(uuid) = &args.uuid {
        if args.prefix.is_some() || args.name.is_some() {
            eprintln!("WARNING: --uuid given, ignoring --prefix and --name.");
        }
        return Uuid::parse_str(uuid)
            .map(LookupKey::Uuid)
            .map_err(|e| format!("Invalid UUID '{}': {}", uuid, e));
    }

    match (&args.prefix, &args.name) {
        (Some(prefix), Some(name)) => Ok(LookupKey::Name {
            prefix: prefix.clone(),
            name: name.clone(),
        }),
        _ => Err("You need to specify either --uuid or --prefix and --name.".to_string()),
    }
}
