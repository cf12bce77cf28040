pub mod config;
mod http_layers;
mod import_routes;
pub mod metrics;
mod playlist_routes;
pub mod server;
pub(self) mod session;
pub mod state;
mod stats_routes;

use serde::Serialize;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};

/// JSON error body shared by every route that rejects a request.
#[derive(Serialize)]
pub(self) struct ErrorResponse {
    pub error: String,
}
