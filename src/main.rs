#![allow(missing_docs)]

//! courier CLI — accept, dispatch, and inspect SMS requests.
//!
//! `send` drives the full pipeline in one process: durable insert, queue
//! publish, worker pool consumption, terminal state. The remaining
//! subcommands are one-shot administrative and read surfaces over the same
//! database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use courier::blacklist::{self, BlacklistGate, SqliteBlacklist};
use courier::config::{self, Config};
use courier::dispatch::{dispatch_queue, run_workers, DispatchWorker};
use courier::index::{self, SearchIndex, SearchQuery};
use courier::logging;
use courier::service::DispatchService;
use courier::store::{self, RequestStore};
use courier::transport::HttpTransportClient;
use courier::types::{DispatchRequest, DispatchStatus};

/// How long `send` waits for the worker pool to reach a terminal state.
const SEND_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "courier", version, about = "Asynchronous SMS dispatch service")]
struct Cli {
    /// Path to courier.toml (defaults to ./courier.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a dispatch request and drive it to a terminal state.
    Send {
        /// Destination phone number.
        #[arg(long)]
        number: String,
        /// Message body.
        #[arg(long)]
        message: String,
    },
    /// Show one request's exact lifecycle state.
    Status {
        /// Request id.
        id: i64,
    },
    /// List requests, optionally filtered by status.
    List {
        /// Lifecycle status filter.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Query the search index.
    Search(SearchArgs),
    /// Administer the blacklist.
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Message term that must match (repeatable; all terms must match).
    #[arg(long = "term")]
    terms: Vec<String>,

    /// Exact phone-number filter.
    #[arg(long)]
    number: Option<String>,

    /// Creation-time lower bound (RFC 3339).
    #[arg(long)]
    from: Option<String>,

    /// Creation-time upper bound (RFC 3339).
    #[arg(long)]
    to: Option<String>,

    /// Zero-based page number (requires --size).
    #[arg(long)]
    page: Option<u32>,

    /// Page size (requires --page).
    #[arg(long)]
    size: Option<u32>,
}

#[derive(Subcommand)]
enum BlacklistAction {
    /// Add numbers to the blacklist.
    Add { numbers: Vec<String> },
    /// Remove numbers from the blacklist.
    Remove { numbers: Vec<String> },
    /// List all blacklisted numbers.
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    InProgress,
    Finished,
    Failed,
}

impl From<StatusArg> for DispatchStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::InProgress => DispatchStatus::InProgress,
            StatusArg::Finished => DispatchStatus::Finished,
            StatusArg::Failed => DispatchStatus::Failed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.as_deref())?;

    // The serving path logs to rotating JSON files; one-shot admin and read
    // subcommands stay console-only.
    let _logging_guard = match &cli.command {
        Command::Send { .. } => logging::init_production(&config::config_dir()?.join("logs"))?,
        _ => logging::init_cli(),
    };

    let pool = open_pool(&cfg).await?;
    init_storage(&pool).await?;

    match cli.command {
        Command::Send { number, message } => cmd_send(&cfg, pool, &number, &message).await,
        Command::Status { id } => cmd_status(pool, id).await,
        Command::List { status } => cmd_list(pool, status).await,
        Command::Search(args) => cmd_search(pool, args).await,
        Command::Blacklist { action } => cmd_blacklist(pool, action).await,
    }
}

/// Load configuration: explicit path, else ./courier.toml, else defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return config::load_config(path);
    }
    let default = Path::new("courier.toml");
    if default.exists() {
        return config::load_config(default);
    }
    Ok(Config::default())
}

async fn open_pool(cfg: &Config) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(&cfg.database.path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect_with(opts)
        .await
        .with_context(|| format!("failed to open database at {}", cfg.database.path))?;
    Ok(pool)
}

/// Explicit startup routine: apply every schema exactly once.
async fn init_storage(pool: &SqlitePool) -> Result<()> {
    store::init_schema(pool)
        .await
        .context("failed to apply row store schema")?;
    index::init_schema(pool)
        .await
        .context("failed to apply search index schema")?;
    blacklist::init_schema(pool)
        .await
        .context("failed to apply blacklist schema")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

/// Maximum accepted message length in characters.
const MAX_MESSAGE_CHARS: usize = 2048;

fn validate_phone_number(number: &str) -> Result<()> {
    let pattern =
        regex::Regex::new(r"^\+?[0-9]{4,16}$").map_err(|e| anyhow::anyhow!("phone pattern: {e}"))?;
    if !pattern.is_match(number) {
        bail!("invalid phone number {number:?}: expected 4-17 characters, digits with optional leading '+'");
    }
    Ok(())
}

fn validate_message(message: &str) -> Result<()> {
    if message.is_empty() {
        bail!("message must not be empty");
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        bail!("message exceeds {MAX_MESSAGE_CHARS} characters");
    }
    Ok(())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid RFC 3339 timestamp {value:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_send(cfg: &Config, pool: SqlitePool, number: &str, message: &str) -> Result<()> {
    validate_phone_number(number)?;
    validate_message(message)?;

    let store = RequestStore::new(pool.clone());
    let search_index = SearchIndex::new(pool.clone());
    let gate: Arc<dyn BlacklistGate> = Arc::new(SqliteBlacklist::new(pool));
    let transport = Arc::new(
        HttpTransportClient::new(&cfg.transport).context("failed to build transport client")?,
    );

    let (producer, rx) = dispatch_queue(
        cfg.dispatch.queue_capacity,
        Duration::from_secs(cfg.dispatch.publish_timeout_secs),
    );
    let worker = Arc::new(DispatchWorker::new(store.clone(), gate, transport));
    let handles = run_workers(cfg.dispatch.workers, rx, worker);
    info!(workers = cfg.dispatch.workers, "dispatch worker pool started");

    let service = DispatchService::new(store.clone(), search_index, producer);
    let request = service
        .create_request(number, message)
        .await
        .context("failed to record dispatch request")?;
    println!("request {} accepted ({})", request.id, request.status.as_str());

    let terminal = wait_for_terminal(&store, request.id).await?;

    // Dropping the service drops the producer; the queue drains and the
    // workers stop.
    drop(service);
    for handle in handles {
        let _ = handle.await;
    }

    print_request(&terminal);
    Ok(())
}

async fn wait_for_terminal(store: &RequestStore, id: i64) -> Result<DispatchRequest> {
    let deadline = tokio::time::Instant::now() + SEND_WAIT;
    loop {
        if let Some(request) = store.find_by_id(id).await? {
            if request.status.is_terminal() {
                return Ok(request);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("request {id} did not reach a terminal state within {SEND_WAIT:?} (still IN_PROGRESS)");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn cmd_status(pool: SqlitePool, id: i64) -> Result<()> {
    let store = RequestStore::new(pool);
    match store.find_by_id(id).await? {
        Some(request) => {
            print_request(&request);
            Ok(())
        }
        None => bail!("no request with id {id}"),
    }
}

async fn cmd_list(pool: SqlitePool, status: Option<StatusArg>) -> Result<()> {
    let store = RequestStore::new(pool);
    let requests = match status {
        Some(status) => store.find_by_status(status.into()).await?,
        None => store.find_all().await?,
    };
    for request in &requests {
        print_request(request);
    }
    println!("{} request(s)", requests.len());
    Ok(())
}

async fn cmd_search(pool: SqlitePool, args: SearchArgs) -> Result<()> {
    let query = SearchQuery {
        from: args.from.as_deref().map(parse_time).transpose()?,
        to: args.to.as_deref().map(parse_time).transpose()?,
        phone_number: args.number,
        message_terms: args.terms,
        page: args.page,
        size: args.size,
    };
    let search_index = SearchIndex::new(pool);
    let results = search_index.search(&query).await?;
    for entry in &results {
        println!(
            "request={} number={} created={} message={:?}",
            entry.request_id,
            entry.phone_number,
            entry.created_at.to_rfc3339(),
            entry.message
        );
    }
    println!("{} match(es)", results.len());
    Ok(())
}

async fn cmd_blacklist(pool: SqlitePool, action: BlacklistAction) -> Result<()> {
    let gate = SqliteBlacklist::new(pool);
    match action {
        BlacklistAction::Add { numbers } => {
            for number in &numbers {
                validate_phone_number(number)?;
            }
            gate.add(&numbers).await?;
            println!("added {} number(s) to the blacklist", numbers.len());
        }
        BlacklistAction::Remove { numbers } => {
            gate.remove(&numbers).await?;
            println!("removed {} number(s) from the blacklist", numbers.len());
        }
        BlacklistAction::List => {
            let mut numbers: Vec<String> = gate.list_all().await?.into_iter().collect();
            numbers.sort();
            for number in &numbers {
                println!("{number}");
            }
            println!("{} blacklisted number(s)", numbers.len());
        }
    }
    Ok(())
}

fn print_request(request: &DispatchRequest) {
    println!(
        "request={} status={} failure_code={} number={} created={} updated={}{}",
        request.id,
        request.status.as_str(),
        request.failure_code.as_str(),
        request.phone_number,
        request.created_at.to_rfc3339(),
        request.updated_at.to_rfc3339(),
        match &request.failure_comment {
            Some(comment) => format!(" comment={comment:?}"),
            None => String::new(),
        }
    );
}
