use axum::extract::FromRef;

use crate::history::HistoryStore;
use crate::import::{AccessGuard, ImportJobStore, ImportSubmission};
use crate::playlist::PlaylistGenerator;
use crate::user::UserStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserStore = Arc<dyn UserStore>;
pub type GuardedHistoryStore = Arc<dyn HistoryStore>;
pub type GuardedImportJobStore = Arc<dyn ImportJobStore>;
pub type GuardedAccessGuard = Arc<AccessGuard>;
pub type GuardedImportSubmission = Arc<ImportSubmission>;
pub type GuardedPlaylistGenerator = Arc<PlaylistGenerator>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_store: GuardedUserStore,
    pub history: GuardedHistoryStore,
    pub jobs: GuardedImportJobStore,
    pub access_guard: GuardedAccessGuard,
    pub submission: GuardedImportSubmission,
    pub generator: GuardedPlaylistGenerator,
}

impl FromRef<ServerState> for GuardedUserStore {
    fn from_ref(input: &ServerState) -> Self {
        input.user_store.clone()
    }
}

impl FromRef<ServerState> for GuardedHistoryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.history.clone()
    }
}

impl FromRef<ServerState> for GuardedImportJobStore {
    fn from_ref(input: &ServerState) -> Self {
        input.jobs.clone()
    }
}

impl FromRef<ServerState> for GuardedAccessGuard {
    fn from_ref(input: &ServerState) -> Self {
        input.access_guard.clone()
    }
}

impl FromRef<ServerState> for GuardedImportSubmission {
    fn from_ref(input: &ServerState) -> Self {
        input.submission.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistGenerator {
    fn from_ref(input: &ServerState) -> Self {
        input.generator.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
