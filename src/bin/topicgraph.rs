//! topicgraph CLI
//!
//! Replays captured topic messages into a fresh store, then prints the
//! projected schema or the result of a query against it.
//!
//! Usage:
//!   topicgraph --replay capture.txt --query '{ home { livingroom { temperature } } }'
//!   topicgraph --replay capture.txt --print-schema
//!   cat capture.txt | topicgraph --replay - --query-file query.graphql
//!
//! Capture files hold one message per line: topic, whitespace, payload.
//! Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use topicgraph::{
    execute, Ingestor, PathSource, PathStore, SchemaCache, SchemaCacheConfig, StalePolicy,
    StoreConfig,
};

/// Query a replayed topic capture through its projected schema
#[derive(Parser, Debug)]
#[command(name = "topicgraph")]
#[command(about = "Project topic captures into a typed query schema")]
struct Args {
    /// Capture file to replay, `-` for stdin (can be specified multiple times)
    #[arg(long, short = 'r')]
    replay: Vec<PathBuf>,

    /// Query text to execute
    #[arg(long, short = 'q', conflicts_with = "query_file")]
    query: Option<String>,

    /// File containing the query to execute
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Print the schema SDL (the default when no query is given)
    #[arg(long)]
    print_schema: bool,

    /// Keep sub-paths a newer structured value no longer produces
    #[arg(long)]
    retain_stale: bool,

    /// Log filter, e.g. "debug" or "topicgraph=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    let store = Arc::new(PathStore::with_config(StoreConfig {
        stale_descendants: if args.retain_stale {
            StalePolicy::Retain
        } else {
            StalePolicy::Prune
        },
    }));
    let cache = Arc::new(SchemaCache::new(
        Arc::clone(&store) as Arc<dyn PathSource>,
        SchemaCacheConfig::default(),
    )?);
    let ingestor = Ingestor::new(Arc::clone(&store)).with_cache(Arc::clone(&cache));

    for path in &args.replay {
        let stats = if path.as_os_str() == "-" {
            ingestor.replay(io::stdin().lock()).context("failed to replay stdin")?
        } else {
            let file = File::open(path)
                .with_context(|| format!("failed to open capture {}", path.display()))?;
            ingestor
                .replay(BufReader::new(file))
                .with_context(|| format!("failed to replay {}", path.display()))?
        };
        tracing::debug!(capture = %path.display(), applied = stats.applied, "capture replayed");
    }

    let schema = cache.fresh().context("schema rebuild did not complete")?;

    let query = match (&args.query, &args.query_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read query file {}", path.display()))?,
        ),
        (None, None) => None,
    };

    if args.print_schema || query.is_none() {
        print!("{}", schema.to_sdl());
    }

    let Some(query) = query else {
        return Ok(ExitCode::SUCCESS);
    };

    let response = execute(&schema, store.as_ref(), &query);
    let rendered =
        serde_json::to_string_pretty(&response).context("failed to serialize response")?;
    println!("{rendered}");

    if response.data.is_none() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid --log-level {directives:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}
