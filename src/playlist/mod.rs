//! Playlist generation from listening history: plain and artist-aware
//! shuffles plus ranking- and recency-based builders.

pub mod generator;
pub mod history_capture;
pub mod models;
pub mod random;
pub mod smart;
pub mod top_tracks;

pub use generator::PlaylistGenerator;
pub use history_capture::{HistoryCaptureBuilder, DEFAULT_CAPTURE_COUNT};
pub use models::{PlaylistAlgorithm, PlaylistRequest, PlaylistResult, StatsRange};
pub use top_tracks::{TopTracksBuilder, TOP_TRACKS_LIMIT};
