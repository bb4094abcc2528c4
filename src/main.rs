//! Redfish-Diver main entry point
//!
//! This is the command-line interface for the Redfish-Diver resource-graph crawler.

use anyhow::{anyhow, bail, Context};
use clap::{ArgGroup, Parser};
use redfish_diver::config::{load_config, Config};
use redfish_diver::crawler::{event_channel, Coordinator, HttpMethod, Search, SearchOutcome};
use redfish_diver::credentials::{key_path_for, AesGcmCipher};
use redfish_diver::output::console::{format_error, format_snapshot};
use redfish_diver::output::{
    format_event, format_report, load_statistics, print_errors, print_nodes, print_statistics,
};
use redfish_diver::storage::{open_storage, SqliteStorage, Storage};
use redfish_diver::DiverError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Redfish-Diver: a resource-graph crawler for Redfish/OData services
///
/// Fetches a resource, follows its `@odata.id` and `href` links depth-first
/// when asked to dive, and keeps every fetched resource with its previous
/// version so changes stand out.
#[derive(Parser, Debug)]
#[command(name = "redfish-diver")]
#[command(version)]
#[command(about = "A resource-graph crawler for Redfish/OData services", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .args(["nodes", "errors", "clear_errors", "remove_node", "stats"])
        .multiple(false)
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Resource URI to fetch, or text to filter the loaded results by
    #[arg(value_name = "KEYWORD", conflicts_with_all = ["mode", "replay"])]
    keyword: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Basic auth username
    #[arg(short, long, default_value = "")]
    username: String,

    /// Basic auth password
    #[arg(short, long, default_value = "")]
    password: String,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Query parameter, repeatable
    #[arg(short = 'P', long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// JSON request body
    #[arg(short, long = "data", value_name = "JSON")]
    data: Option<String>,

    /// Follow links depth-first after the first fetch (GET only)
    #[arg(long)]
    dive: bool,

    /// Send an If-Match header with this ETag
    #[arg(long, value_name = "ETAG")]
    if_match: Option<String>,

    /// Load the stored snapshots of an origin before searching
    #[arg(long, value_name = "ORIGIN")]
    origin: Option<String>,

    /// Repeat the stored request for a URI
    #[arg(long, value_name = "URI", conflicts_with = "mode")]
    replay: Option<String>,

    /// List registered nodes and exit
    #[arg(long)]
    nodes: bool,

    /// Show the error log and exit
    #[arg(long)]
    errors: bool,

    /// Clear the error log and exit
    #[arg(long)]
    clear_errors: bool,

    /// Remove a node and all snapshots of its origin, then exit
    #[arg(long, value_name = "ORIGIN")]
    remove_node: Option<String>,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if cli.nodes {
        handle_nodes(&config)
    } else if cli.errors {
        handle_errors(&config)
    } else if cli.clear_errors {
        handle_clear_errors(&config)
    } else if let Some(origin) = &cli.remove_node {
        handle_remove_node(config, origin)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_search(config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("redfish_diver=info,warn"),
            1 => EnvFilter::new("redfish_diver=debug,info"),
            2 => EnvFilter::new("redfish_diver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --nodes mode
fn handle_nodes(config: &Config) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    print_nodes(&storage.list_nodes()?);
    Ok(())
}

/// Handles the --errors mode
fn handle_errors(config: &Config) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    print_errors(&storage.list_errors()?);
    Ok(())
}

/// Handles the --clear-errors mode
fn handle_clear_errors(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let removed = storage.clear_errors()?;
    println!("Cleared {} error log entries.", removed);
    Ok(())
}

/// Handles the --remove-node mode
fn handle_remove_node(config: Config, origin: &str) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::open(config)?;
    let removed = coordinator.remove_node(origin)?;
    println!("Removed {} and {} snapshots.", origin, removed);
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Builds a search from the request options
fn build_search(cli: &Cli, keyword: &str) -> anyhow::Result<Search> {
    let method: HttpMethod = cli.method.parse()?;

    let mut search = Search::new(keyword)
        .with_method(method)
        .with_credentials(cli.username.as_str(), cli.password.as_str())
        .with_auto_dive(cli.dive);

    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| anyhow!("Header must look like 'Name: value', got {:?}", header))?;
        search = search.with_header(name.trim(), value.trim());
    }

    for param in &cli.params {
        let (name, value) = param
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter must look like 'name=value', got {:?}", param))?;
        search = search.with_param(name, value);
    }

    if let Some(data) = &cli.data {
        search = search.with_json_body(data.as_str());
    }

    if let Some(etag) = &cli.if_match {
        search = search.with_if_match(etag.as_str());
    }

    Ok(search)
}

/// Handles the main search operation
async fn handle_search(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let key_path = key_path_for(Path::new(&config.storage.database_path));
    let cipher = AesGcmCipher::load_or_create(&key_path)
        .with_context(|| format!("Failed to load credential key {}", key_path.display()))?;

    let (events, mut receiver) = event_channel();
    let mut coordinator = Coordinator::open(config)?
        .with_cipher(Arc::new(cipher))
        .with_events(events);

    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Some(line) = format_event(&event) {
                println!("{}", line);
            }
        }
    });

    let control = coordinator.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested, finishing in-flight request");
            control.cancel();
        }
    });

    if let Some(origin) = &cli.origin {
        let loaded = coordinator.load_origin(origin)?.len();
        tracing::info!("Loaded {} stored snapshots of {}", loaded, origin);
    }

    let search = match (&cli.replay, &cli.keyword) {
        (Some(uri), _) => coordinator
            .replay_search(uri)?
            .ok_or_else(|| anyhow!("No stored request and node for {}", uri))?,
        (None, Some(keyword)) => build_search(cli, keyword)?,
        (None, None) if cli.origin.is_some() => {
            for snapshot in coordinator.results() {
                println!("{}", format_snapshot(snapshot));
            }
            return Ok(());
        }
        (None, None) => bail!("Nothing to do: give a KEYWORD, --replay or a mode flag"),
    };

    let outcome = coordinator.search(search).await;
    let last_etag = coordinator.last_etag().to_string();

    // Closes the event channel so the printer drains and stops
    drop(coordinator);
    printer.await?;

    match outcome {
        Ok(SearchOutcome::Crawled(report)) => {
            println!("{}", format_report(&report));
            if !last_etag.is_empty() {
                println!("ETag: {}", last_etag);
            }
            Ok(())
        }
        Ok(SearchOutcome::Filtered(matches)) => {
            for snapshot in &matches {
                println!("{}", format_snapshot(snapshot));
            }
            println!("{} matches", matches.len());
            Ok(())
        }
        Err(DiverError::SeedFailed(error)) => {
            bail!("Crawl failed: {}", format_error(&error))
        }
        Err(e) => Err(e.into()),
    }
}
