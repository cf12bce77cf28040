use crate::history::{HistoryEntry, HistoryStore};
use anyhow::Result;
use std::sync::Arc;

pub const DEFAULT_CAPTURE_COUNT: usize = 50;

/// Captures a slice of listening history as a playlist: distinct tracks,
/// most recent first, optionally bounded to a time window.
pub struct HistoryCaptureBuilder {
    history: Arc<dyn HistoryStore>,
}

impl HistoryCaptureBuilder {
    pub fn new(history: Arc<dyn HistoryStore>) -> HistoryCaptureBuilder {
        HistoryCaptureBuilder { history }
    }

    pub fn build(
        &self,
        user_id: usize,
        count: Option<usize>,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Result<Vec<HistoryEntry>> {
        self.history
            .recent_tracks(user_id, from, to, count.unwrap_or(DEFAULT_CAPTURE_COUNT))
    }
}
