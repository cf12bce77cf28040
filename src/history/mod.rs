//! Per-user play history: models, schema and SQLite store.

pub mod models;
pub mod schema;
pub mod store;

pub use models::{DedupKey, HistoryEntry, ListeningSummary, PlayEvent, RankedTrack, TrackRef};
pub use store::{HistoryStore, SqliteHistoryStore};
