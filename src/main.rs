use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rewound_server::config::{AppConfig, CliConfig, FileConfig};
use rewound_server::history::{HistoryStore, SqliteHistoryStore};
use rewound_server::import::{ImportJobStore, ImportWorkerPool, ProgressStore, SqliteImportJobStore};
use rewound_server::server::state::ServerState;
use rewound_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig};
use rewound_server::user::{AuthToken, SqliteUserStore, UserStore};

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
    /// Directory holding the SQLite databases and the upload spool.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to an optional TOML config file. File values override CLI.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Number of days a session token may stay unused before the pruning
    /// ticker deletes it. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub session_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if session_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// Create a user with this handle, print a session token and exit.
    #[clap(long)]
    pub add_user: Option<String>,
}

fn add_user(user_store: &dyn UserStore, handle: &str) -> Result<()> {
    let user_id = user_store.create_user(handle)?;
    let token = AuthToken::issue(user_id);
    user_store.add_auth_token(&token)?;
    println!("Created user '{}' with id {}", handle, user_id);
    println!("Session token: {}", token.value.0);
    Ok(())
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
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level.clone(),
        session_retention_days: cli_args.session_retention_days,
        prune_interval_hours: cli_args.prune_interval_hours,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite user database at {:?}...",
        config.user_db_path()
    );
    let user_store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::open(&config.user_db_path())?);

    if let Some(handle) = &cli_args.add_user {
        return add_user(user_store.as_ref(), handle);
    }

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    info!(
        "Opening SQLite history database at {:?}...",
        config.history_db_path()
    );
    let history: Arc<dyn HistoryStore> =
        Arc::new(SqliteHistoryStore::open(&config.history_db_path())?);

    info!(
        "Opening SQLite import queue at {:?}...",
        config.import_jobs_db_path()
    );
    let jobs: Arc<dyn ImportJobStore> =
        Arc::new(SqliteImportJobStore::open(&config.import_jobs_db_path())?);

    std::fs::create_dir_all(config.spool_dir())
        .with_context(|| format!("Failed to create spool dir: {:?}", config.spool_dir()))?;

    let progress = Arc::new(ProgressStore::new(jobs.clone()));
    let shutdown = CancellationToken::new();

    let pool = Arc::new(ImportWorkerPool::new(
        jobs.clone(),
        history.clone(),
        progress.clone(),
        config.import.worker_pool_config(),
    ));
    let worker_handles = pool.spawn(shutdown.clone());

    // Spawn background task for session token pruning if enabled
    if config.session_retention_days > 0 {
        let retention_days = config.session_retention_days;
        let interval_hours = config.prune_interval_hours;
        let pruning_user_store = user_store.clone();

        info!(
            "Session pruning enabled: retaining {} days, pruning every {} hours",
            retention_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match pruning_user_store.prune_auth_tokens(retention_days) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} stale session tokens", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune session tokens: {}", e);
                    }
                }
            }
        });
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        max_upload_bytes: config.import.max_upload_bytes(),
    };
    let state = ServerState::new(
        server_config,
        user_store,
        history,
        jobs,
        progress,
        config.spool_dir(),
    );

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(state, shutdown).await?;

    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
