//! omdbq - OMDb movie search CLI.

/// Application configuration (TOML).
mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use crate::config::{AppConfig, AppDirs, CacheBackend};
use omdbq_api::{
    ErrorKind, LocalOmdbApi, MediaType, MemoryCache, OmdbClient, OmdbError, ResultTable,
    SearchOptions, SearchQuery, TableCache, TitleDetails, is_imdb_id,
};
use omdbq_cache::SqliteCache;

/// Environment variable holding the OMDb API key.
const API_KEY_ENV: &str = "OMDB_API_KEY";

/// Columns left out of the log table view (long URLs).
const TABLE_VIEW_HIDDEN_COLUMNS: &[&str] = &["Poster"];

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Search OMDb by title.
    Search(SearchArgs),
    /// Show the full record of one title.
    Title(TitleArgs),
    /// Persistent result cache operations.
    Cache(CacheCommand),
}

/// `type` filter values.
#[derive(Clone, Copy, ValueEnum)]
enum MediaTypeArg {
    /// Feature films.
    Movie,
    /// TV series.
    Series,
    /// Single episodes.
    Episode,
}

impl From<MediaTypeArg> for MediaType {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Movie => Self::Movie,
            MediaTypeArg::Series => Self::Series,
            MediaTypeArg::Episode => Self::Episode,
        }
    }
}

/// Output formats for search results.
#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Tab-separated rows in the log.
    #[default]
    Table,
    /// CSV on stdout.
    Csv,
}

/// Arguments for the `search` subcommand.
#[derive(clap::Args)]
struct SearchArgs {
    /// Title to search for (e.g. "Batman").
    #[arg(long, required = true)]
    title: String,

    /// Filter by media type.
    #[arg(long = "type", value_enum)]
    media_type: Option<MediaTypeArg>,

    /// Filter by release year.
    #[arg(long)]
    year: Option<u16>,

    /// Result page (10 hits per page).
    #[arg(long)]
    page: Option<u32>,

    /// Fetch the full record of every hit (one extra request per row).
    #[arg(long)]
    full: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write CSV to this file instead of printing.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Cache time-to-live in seconds (default: from config, 3600).
    #[arg(long)]
    ttl: Option<u64>,

    /// Bypass the result cache for this search.
    #[arg(long)]
    no_cache: bool,
}

/// Arguments for the `title` subcommand.
#[derive(clap::Args)]
struct TitleArgs {
    /// IMDb ID (e.g. "tt0372784").
    #[arg(long, required = true)]
    id: String,
}

/// Arguments for the `cache` subcommand.
#[derive(clap::Args)]
struct CacheCommand {
    /// Cache subcommand to run.
    #[command(subcommand)]
    command: CacheSubcommands,
}

/// Available cache subcommands.
#[derive(Subcommand)]
enum CacheSubcommands {
    /// Drop every cached search result.
    Clear,
    /// Drop expired cached search results.
    Purge,
}

/// Picks the API key: `env_key` (from `OMDB_API_KEY`) first, then
/// `omdb.api_key` in config. Blank values count as missing.
///
/// # Errors
///
/// Returns an error if neither source provides a key.
fn resolve_api_key(env_key: Option<String>, config: &AppConfig) -> Result<String> {
    env_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            config
                .omdb
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
        })
        .with_context(|| {
            format!("{API_KEY_ENV} environment variable or omdb.api_key in config.toml is required")
        })
}

/// Builds the result cache selected in config, or an empty one for `bypass`.
///
/// # Errors
///
/// Returns an error if the `SQLite` cache cannot be opened.
fn build_cache(config: &AppConfig, dirs: &AppDirs, bypass: bool) -> Result<Arc<dyn TableCache>> {
    if bypass {
        return Ok(Arc::new(MemoryCache::new()));
    }
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackend::Sqlite => {
            let cache =
                SqliteCache::open(dirs.data_dir()).context("failed to open result cache")?;
            Ok(Arc::new(cache))
        }
    }
}

/// Builds an `OmdbClient` from config and environment.
///
/// # Errors
///
/// Returns an error if the API key is missing, the base URL is invalid,
/// the cache cannot be opened, or the client fails to build.
#[instrument(skip_all)]
fn build_omdb_client(config: &AppConfig, dirs: &AppDirs, no_cache: bool) -> Result<OmdbClient> {
    let api_key = resolve_api_key(std::env::var(API_KEY_ENV).ok(), config)?;
    let base_url = Url::parse(&config.omdb.base_url)
        .with_context(|| format!("invalid omdb.base_url: {}", config.omdb.base_url))?;
    let cache = build_cache(config, dirs, no_cache)?;

    OmdbClient::builder()
        .api_key(api_key)
        .base_url(base_url)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .retry_policy(config.retry_policy())
        .cache(cache)
        .build()
        .context("failed to build OMDb client")
}

/// Loads `config.toml` from the config directory.
///
/// # Errors
///
/// Returns an error if the file exists but is invalid.
fn load_config(dirs: &AppDirs) -> Result<AppConfig> {
    AppConfig::load(&dirs.config_file()).context("failed to load config")
}

/// Turns a client error into a CLI error, labelling upstream failures.
fn describe_omdb_error(err: OmdbError, action: &str) -> anyhow::Error {
    match err.kind() {
        ErrorKind::Api => anyhow::anyhow!("API Error: {err}"),
        ErrorKind::Request => anyhow::Error::new(err).context(format!("{action} failed")),
    }
}

/// Composes the query fragment from search arguments.
fn build_query(args: &SearchArgs) -> SearchQuery {
    let mut query = SearchQuery::new(&args.title);
    if let Some(media_type) = args.media_type {
        query = query.media_type(media_type.into());
    }
    if let Some(year) = args.year {
        query = query.year(year);
    }
    if let Some(page) = args.page {
        query = query.page(page);
    }
    query
}

/// Echoes the composed query and runs the search through `api`.
///
/// # Errors
///
/// Returns `API Error: ...` when OMDb reports a failure, or the request
/// error otherwise.
#[allow(clippy::future_not_send)]
async fn fetch_table(
    api: &(impl LocalOmdbApi + Sync),
    query: &SearchQuery,
    options: &SearchOptions,
) -> Result<ResultTable> {
    let query = query.to_query_string();
    tracing::info!("Your query: {query}");
    api.search(&query, options)
        .await
        .map_err(|e| describe_omdb_error(e, "OMDb search"))
}

/// Fetches one title record through `api`.
///
/// # Errors
///
/// Same as [`fetch_table`].
#[allow(clippy::future_not_send)]
async fn fetch_title(api: &(impl LocalOmdbApi + Sync), imdb_id: &str) -> Result<TitleDetails> {
    api.title(imdb_id)
        .await
        .map_err(|e| describe_omdb_error(e, "OMDb title lookup"))
}

/// Runs the `search` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build, the search fails,
/// or the output cannot be written.
#[instrument(skip_all)]
async fn run_search(args: &SearchArgs, dirs: &AppDirs) -> Result<()> {
    let config = load_config(dirs)?;
    let client = build_omdb_client(&config, dirs, args.no_cache)?;

    let ttl = if args.no_cache {
        Duration::ZERO
    } else {
        args.ttl.map_or_else(|| config.cache_ttl(), Duration::from_secs)
    };
    let options = SearchOptions::default().detail(args.full).ttl(ttl);

    let table = fetch_table(&client, &build_query(args), &options).await?;

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        table.write_csv(file)?;
        tracing::info!("Results exported to {}", path.display());
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => log_table(&table),
        OutputFormat::Csv => {
            let mut stdout = std::io::stdout().lock();
            table.write_csv(&mut stdout)?;
            stdout.flush().context("failed to flush stdout")?;
        }
    }

    Ok(())
}

/// Logs the table as tab-separated rows.
fn log_table(table: &ResultTable) {
    let columns: Vec<&str> = table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !TABLE_VIEW_HIDDEN_COLUMNS.contains(c))
        .collect();

    tracing::info!("{}", columns.join("\t"));
    for row in table.rows() {
        let cells: Vec<&str> = columns
            .iter()
            .map(|c| row.get(*c).map_or("-", String::as_str))
            .collect();
        tracing::info!("{}", cells.join("\t"));
    }
    tracing::info!(
        "Total: {} results (of {})",
        table.len(),
        table
            .total_results()
            .map_or_else(|| String::from("-"), |n| n.to_string()),
    );
}

/// Runs the `title` subcommand.
///
/// # Errors
///
/// Returns an error if the ID is malformed, the client fails to build,
/// or the lookup fails.
#[instrument(skip_all)]
async fn run_title(args: &TitleArgs, dirs: &AppDirs) -> Result<()> {
    if !is_imdb_id(&args.id) {
        bail!("invalid IMDb ID: {} (expected e.g. tt0372784)", args.id);
    }

    let config = load_config(dirs)?;
    let client = build_omdb_client(&config, dirs, true)?;

    let details = fetch_title(&client, &args.id).await?;

    for (key, value) in &details {
        tracing::info!("{key}: {value}");
    }

    Ok(())
}

/// Runs the `cache clear` subcommand.
///
/// # Errors
///
/// Returns an error if the cache database cannot be opened or written.
#[instrument(skip_all)]
fn run_cache_clear(dirs: &AppDirs) -> Result<()> {
    let cache = SqliteCache::open(dirs.data_dir()).context("failed to open result cache")?;
    let count = cache.len()?;
    cache.clear()?;
    tracing::info!("Cleared {count} cached search(es)");
    Ok(())
}

/// Runs the `cache purge` subcommand.
///
/// # Errors
///
/// Returns an error if the cache database cannot be opened or written.
#[instrument(skip_all)]
fn run_cache_purge(dirs: &AppDirs) -> Result<()> {
    let cache = SqliteCache::open(dirs.data_dir()).context("failed to open result cache")?;
    let removed = cache.purge_expired()?;
    tracing::info!("Purged {removed} expired cached search(es)");
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    let dirs = AppDirs::resolve(cli.dir.as_deref())?;
    match cli.command {
        Commands::Search(args) => run_search(&args, &dirs).await,
        Commands::Title(args) => run_title(&args, &dirs).await,
        Commands::Cache(cache) => match cache.command {
            CacheSubcommands::Clear => run_cache_clear(&dirs),
            CacheSubcommands::Purge => run_cache_purge(&dirs),
        },
    }
}
