use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use bookmark_server::bookmark::SqliteBookmarkStore;
use bookmark_server::bookmark_manager::{BookmarkManager, DEFAULT_PER_PAGE};
use bookmark_server::config;
use bookmark_server::post_service::HttpPostLookupClient;
use bookmark_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite bookmark database file. Created if missing.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Base URL of the post service used to enrich bookmarked posts.
    #[clap(long)]
    pub post_service_url: Option<String>,

    /// Timeout in seconds for post service requests.
    #[clap(long, default_value_t = 5)]
    pub post_service_timeout_sec: u64,

    /// Number of bookmarks per page when listing.
    #[clap(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: usize,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            post_service_url: args.post_service_url.clone(),
            post_service_timeout_sec: args.post_service_timeout_sec,
            per_page: args.per_page,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_path: {:?}", app_config.db_path);
    info!("  port: {}", app_config.port);
    info!("  metrics_port: {}", app_config.metrics_port);
    info!("  post_service_url: {}", app_config.post_service_url);
    info!("  per_page: {}", app_config.per_page);

    info!("Initializing metrics...");
    metrics::init_metrics();

    if !app_config.db_path.exists() {
        info!(
            "Bookmark database not found at {:?}, creating it",
            app_config.db_path
        );
    }
    let bookmark_store = SqliteBookmarkStore::new(&app_config.db_path)
        .with_context(|| format!("Failed to open bookmark database {:?}", app_config.db_path))?;

    info!("Connecting to post service at {}...", app_config.post_service_url);
    let post_lookup = HttpPostLookupClient::connect(
        &app_config.post_service_url,
        app_config.post_service_timeout_sec,
    )
    .await
    .context("Post service is not reachable")?;

    let bookmark_manager = BookmarkManager::new(Arc::new(bookmark_store), Arc::new(post_lookup));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level,
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        per_page: app_config.per_page,
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(server_config, bookmark_manager).await
}
