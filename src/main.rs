use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use musicbox_server::background_jobs::jobs::{LibraryScanJob, SessionCleanupJob};
use musicbox_server::background_jobs::{JobContext, JobScheduler};
use musicbox_server::catalog_store::SqliteCatalogStore;
use musicbox_server::config::{AppConfig, CliConfig, EnvConfig, FileConfig};
use musicbox_server::server::ServerConfig;
use musicbox_server::{run_server, LibraryService, RequestsLoggingLevel, SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its settings override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the audio files. Falls back to $MUSIC_DIRECTORY.
    #[clap(long, value_parser = parse_path)]
    pub music_dir: Option<PathBuf>,

    /// Directory where extracted album art is stored. Falls back to
    /// $ALBUM_ART_DIRECTORY.
    #[clap(long, value_parser = parse_path)]
    pub artwork_dir: Option<PathBuf>,

    /// Directory containing catalog.db and user.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Days a session may stay unused before it expires.
    #[clap(long, default_value_t = 30)]
    pub session_ttl_days: u64,

    /// Minutes between periodic library scans. 0 disables them.
    #[clap(long, default_value_t = 0)]
    pub scan_interval_minutes: u64,

    /// Scan the library once when the server starts.
    #[clap(long)]
    pub scan_on_startup: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            music_dir: self.music_dir.clone(),
            artwork_dir: self.artwork_dir.clone(),
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            session_ttl_days: self.session_ttl_days,
            scan_interval_minutes: self.scan_interval_minutes,
            scan_on_startup: self.scan_on_startup,
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

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), &EnvConfig::from_env(), file_config)?;

    info!(
        "Music directory: {:?}, album art directory: {:?}",
        config.library.music_root, config.library.artwork_root
    );

    info!("Opening SQLite catalog database at {:?}...", config.catalog_db_path());
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);

    info!("Opening SQLite user database at {:?}...", config.user_db_path());
    let user_store = Arc::new(SqliteUserStore::new(config.user_db_path())?);

    let library = Arc::new(
        LibraryService::new(&config.library, catalog_store)
            .context("Failed to resolve the library directories")?,
    );
    let user_manager = Arc::new(UserManager::new(user_store, config.session_ttl));

    let shutdown_token = CancellationToken::new();

    let job_context = JobContext::new(shutdown_token.child_token(), library.clone(), user_manager.clone());
    let mut scheduler = JobScheduler::new(shutdown_token.clone(), job_context);
    let scan_job = LibraryScanJob::new(config.scan.interval, config.scan.on_startup);
    if scan_job.is_enabled() {
        scheduler.register_job(Arc::new(scan_job));
    } else {
        info!("Automatic library scans disabled, use POST /v1/admin/scan");
    }
    scheduler.register_job(Arc::new(SessionCleanupJob));
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutdown requested");
        signal_token.cancel();
    });

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        frontend_dir_path: config.frontend_dir_path.clone(),
    };

    info!("Ready to serve at port {}!", config.port);
    let served = run_server(server_config, library, user_manager, shutdown_token.clone()).await;

    // The server may also stop on its own error; make sure jobs wind down.
    shutdown_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Job scheduler task failed: {}", e);
    }
    served
}
