//! Rewound Server Library
//!
//! This library exposes the internal modules for testing and reuse from the
//! server binary.

pub mod config;
pub mod history;
pub mod import;
pub mod playlist;
pub mod server;
pub mod user;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{SqliteUserStore, UserStore};
