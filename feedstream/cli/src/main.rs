//! feedstream - Command-Line Atom Feed Reader
//!
//! Streams every entry of a paginated Atom collection to stdout as JSON
//! lines, reading pages as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Stream a collection (pull view on a blocking thread)
//! feedstream --base-url http://localhost:8080/api --namespace main jobs
//!
//! # Push view, first 10 entries only
//! feedstream --observe --limit 10 jobs
//!
//! # Single entity, retried while the server reports not-ready
//! feedstream entity jobs 42
//!
//! # Feed header (cached)
//! feedstream metadata jobs
//!
//! # Verbose logging
//! RUST_LOG=debug feedstream jobs
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::info;

use feedstream_core::{
    load_config_from_path, AtomEntry, ConfigOverrides, FeedClient, RecordObserver, StreamError,
    StreamingResult,
};

/// feedstream - stream paginated Atom feeds as JSON lines
#[derive(Parser, Debug)]
#[command(name = "feedstream")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "FEEDSTREAM_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Service root URL
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Namespace under the service root
    #[arg(short = 'n', long, value_name = "NS", global = true)]
    namespace: Option<String>,

    /// Connect timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    timeout_ms: Option<u64>,

    /// Maximum pages to read (0 = unlimited)
    #[arg(long, value_name = "N", global = true)]
    max_pages: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "FEEDSTREAM_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    /// Stop after this many entries
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Deliver entries through a push observer instead of an iterator
    #[arg(long)]
    observe: bool,

    /// Collection to stream
    #[arg(value_name = "RESOURCE")]
    resource: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a single entity by key
    Entity {
        /// Collection the entity belongs to
        resource: String,
        /// Entity key
        id: String,
    },
    /// Show the feed header of a collection
    Metadata {
        /// Collection to inspect
        resource: String,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("feedstream={level},feedstream_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn build_client(args: &Args) -> Result<FeedClient> {
    let mut config = load_config_from_path(
        args.config
            .clone()
            .or_else(feedstream_core::config::default_config_path),
    )
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.base_url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(ref namespace) = args.namespace {
        overrides = overrides.with_namespace(namespace.clone());
    }
    if let Some(ms) = args.timeout_ms {
        overrides = overrides.with_timeout_ms(ms);
    }
    if let Some(pages) = args.max_pages {
        overrides = overrides.with_max_pages(pages);
    }
    overrides
        .apply(&mut config)
        .context("Invalid command-line overrides")?;

    info!(
        base_url = %config.client.base_url,
        namespace = %config.client.namespace,
        source = %config.source(),
        "Configuration resolved"
    );

    FeedClient::new(config.client).context("Failed to create feed client")
}

fn write_json_line<T: Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)
}

/// Pull view: iterate on a blocking thread
async fn stream_pull(result: StreamingResult<AtomEntry>, limit: Option<usize>) -> Result<u64> {
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for item in result.iter()?.take(limit.unwrap_or(usize::MAX)) {
            let entry = item.context("Feed stream failed")?;
            write_json_line(&mut out, &entry)?;
        }
        out.flush()?;
        Ok(result.read_count())
    })
    .await
    .context("Reader thread failed")?
}

/// Push observer printing each entry as a JSON line
struct JsonLines<W> {
    out: W,
    limit: Option<u64>,
    written: u64,
    outcome: Option<oneshot::Sender<Result<u64, String>>>,
}

impl<W: Write> JsonLines<W> {
    fn new(out: W, limit: Option<usize>) -> (Self, oneshot::Receiver<Result<u64, String>>) {
        let (tx, rx) = oneshot::channel();
        let observer = Self {
            out,
            limit: limit.map(|n| n as u64),
            written: 0,
            outcome: Some(tx),
        };
        (observer, rx)
    }

    fn report(&mut self, outcome: Result<u64, String>) {
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl<W: Write + Send + 'static> RecordObserver<AtomEntry> for JsonLines<W> {
    fn on_next(&mut self, entry: AtomEntry) {
        if self.outcome.is_none() {
            return;
        }
        if self.limit.is_some_and(|n| self.written >= n) {
            let written = self.written;
            self.report(Ok(written));
            return;
        }
        if let Err(e) = write_json_line(&mut self.out, &entry).and_then(|()| self.out.flush()) {
            self.report(Err(format!("Failed to write entry: {e}")));
            return;
        }
        self.written += 1;
        if self.limit == Some(self.written) {
            let written = self.written;
            self.report(Ok(written));
        }
    }

    fn on_error(&mut self, error: StreamError) {
        self.report(Err(error.to_string()));
    }

    fn on_completed(&mut self) {
        let written = self.written;
        self.report(Ok(written));
    }
}

/// Dispose on a blocking thread; disposal joins the producer
async fn dispose_off_runtime(result: StreamingResult<AtomEntry>) -> Result<()> {
    tokio::task::spawn_blocking(move || result.dispose())
        .await
        .context("Dispose failed")
}

/// Push view: observer task on the runtime
async fn stream_push(result: StreamingResult<AtomEntry>, limit: Option<usize>) -> Result<u64> {
    let (observer, rx) = JsonLines::new(io::stdout(), limit);
    let subscription = match result.subscribe(observer) {
        Ok(subscription) => subscription,
        Err(e) => {
            dispose_off_runtime(result).await?;
            return Err(e.into());
        }
    };

    let outcome = rx.await;
    dispose_off_runtime(result).await?;
    subscription.finished().await;

    outcome
        .context("Observer stopped without reporting")?
        .map_err(|e| anyhow::anyhow!("Feed stream failed: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let client = build_client(&args)?;
    let mut stdout = io::stdout();

    match args.command {
        Some(Command::Entity { ref resource, ref id }) => {
            let entry = client
                .fetch_entity(resource, id)
                .await
                .with_context(|| format!("Failed to fetch {resource}('{id}')"))?;
            write_json_line(&mut stdout, &entry)?;
        }
        Some(Command::Metadata { ref resource }) => {
            let metadata = client
                .metadata(resource)
                .await
                .with_context(|| format!("Failed to read metadata of {resource}"))?;
            write_json_line(&mut stdout, &metadata)?;
        }
        None => {
            let resource = args
                .resource
                .as_deref()
                .context("A RESOURCE or a subcommand is required")?;
            let result = client
                .query(resource)
                .await
                .with_context(|| format!("Failed to query {resource}"))?;
            let stream_id = result.id();

            let records = if args.observe {
                stream_push(result, args.limit).await?
            } else {
                stream_pull(result, args.limit).await?
            };

            if args.limit.is_some_and(|n| records as usize >= n) {
                info!(%stream_id, records, "Stopped at entry limit");
            }
            eprintln!("{records} entries read from {resource}");
        }
    }

    Ok(())
}
