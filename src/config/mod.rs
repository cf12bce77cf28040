mod file_config;

pub use file_config::{FileConfig, ImportConfig};

use crate::import::ImportWorkerPoolConfig;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can take part in config resolution.
/// TOML file values override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub session_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub session_retention_days: u64,
    pub prune_interval_hours: u64,

    // Import worker settings (with defaults)
    pub import: ImportSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let session_retention_days = file
            .session_retention_days
            .unwrap_or(cli.session_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        // Import settings - merge file config with defaults
        let import_file = file.import.unwrap_or_default();
        let import = ImportSettings {
            worker_count: import_file.worker_count.unwrap_or(2),
            poll_interval_secs: import_file.poll_interval_secs.unwrap_or(1),
            progress_flush_every: import_file.progress_flush_every.unwrap_or(500),
            stale_claim_timeout_secs: import_file.stale_claim_timeout_secs.unwrap_or(600),
            max_attempts: import_file.max_attempts.unwrap_or(3),
            max_upload_mb: import_file.max_upload_mb.unwrap_or(64),
        };

        if import.worker_count == 0 {
            bail!("import.worker_count must be at least 1");
        }
        if import.max_attempts == 0 {
            bail!("import.max_attempts must be at least 1");
        }
        if import.max_upload_mb == 0 {
            bail!("import.max_upload_mb must be at least 1");
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            session_retention_days,
            prune_interval_hours,
            import,
        })
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.db_dir.join("history.db")
    }

    pub fn import_jobs_db_path(&self) -> PathBuf {
        self.db_dir.join("import_jobs.db")
    }

    /// Uploaded exports are spooled here until a worker consumes them.
    pub fn spool_dir(&self) -> PathBuf {
        self.db_dir.join("import_spool")
    }
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub worker_count: usize,
    pub poll_interval_secs: u64,
    pub progress_flush_every: u64,
    pub stale_claim_timeout_secs: u64,
    pub max_attempts: u32,
    pub max_upload_mb: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            worker_count: 2,
            poll_interval_secs: 1,
            progress_flush_every: 500,
            stale_claim_timeout_secs: 600,
            max_attempts: 3,
            max_upload_mb: 64,
        }
    }
}

impl ImportSettings {
    pub fn worker_pool_config(&self) -> ImportWorkerPoolConfig {
        ImportWorkerPoolConfig {
            worker_count: self.worker_count,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            progress_flush_every: self.progress_flush_every,
            stale_claim_timeout: Duration::from_secs(self.stale_claim_timeout_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
