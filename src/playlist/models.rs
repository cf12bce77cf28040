use crate::history::TrackRef;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistAlgorithm {
    Random,
    Smart,
    TopTracks,
    History,
}

/// Time window for ranking queries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatsRange {
    LastFourWeeks,
    LastSixMonths,
    LastYear,
    #[default]
    AllTime,
}

impl StatsRange {
    /// Oldest play timestamp (unix seconds) the range admits, or None for
    /// the unbounded range.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<i64> {
        let span = match self {
            StatsRange::LastFourWeeks => Duration::weeks(4),
            StatsRange::LastSixMonths => Duration::weeks(26),
            StatsRange::LastYear => Duration::weeks(52),
            StatsRange::AllTime => return None,
        };
        Some((now - span).timestamp())
    }
}

/// A playlist generation request. Everything beyond the algorithm is
/// optional; each algorithm reads the fields it understands and ignores
/// the rest.
#[derive(Deserialize, Debug, Clone)]
pub struct PlaylistRequest {
    pub algorithm: PlaylistAlgorithm,
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit source pool for the shuffle algorithms. When absent they
    /// draw from recent history.
    #[serde(default)]
    pub tracks: Option<Vec<TrackRef>>,
    #[serde(default)]
    pub count: Option<usize>,
    /// Minimum number of other tracks between two by the same artist.
    #[serde(default)]
    pub artist_spacing: Option<usize>,
    #[serde(default)]
    pub range: Option<StatsRange>,
    /// Window bounds (unix seconds, inclusive) for history capture.
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlaylistResult {
    pub name: String,
    pub algorithm: PlaylistAlgorithm,
    pub tracks: Vec<TrackRef>,
}
