use crate::history::{HistoryStore, PlayEvent};
use std::sync::Arc;

/// Pre-insert duplicate check against the history store.
///
/// This is advisory: it lets the import pipeline count a record as skipped
/// without attempting the insert. The unique index on the history table is
/// the final arbiter, so a record that slips past this check still cannot
/// be stored twice.
pub struct Deduplicator {
    history: Arc<dyn HistoryStore>,
}

impl Deduplicator {
    pub fn new(history: Arc<dyn HistoryStore>) -> Deduplicator {
        Deduplicator { history }
    }

    pub fn is_duplicate(&self, user_id: usize, event: &PlayEvent) -> anyhow::Result<bool> {
        self.history.contains_play(user_id, &event.dedup_key())
    }
}
