//! Entry point turning a playlist request into an ordered track list.

use super::history_capture::HistoryCaptureBuilder;
use super::models::{PlaylistAlgorithm, PlaylistRequest, PlaylistResult};
use super::random::shuffle;
use super::smart::smart_shuffle;
use super::top_tracks::TopTracksBuilder;
use crate::history::{HistoryStore, TrackRef};
use anyhow::Result;
use std::sync::Arc;

/// Tracks drawn from recent history when a shuffle request names no pool.
const DEFAULT_SOURCE_COUNT: usize = 50;
const DEFAULT_ARTIST_SPACING: usize = 2;

pub struct PlaylistGenerator {
    history: Arc<dyn HistoryStore>,
    top_tracks: TopTracksBuilder,
    capture: HistoryCaptureBuilder,
}

impl PlaylistGenerator {
    pub fn new(history: Arc<dyn HistoryStore>) -> PlaylistGenerator {
        PlaylistGenerator {
            top_tracks: TopTracksBuilder::new(history.clone()),
            capture: HistoryCaptureBuilder::new(history.clone()),
            history,
        }
    }

    pub fn generate(&self, user_id: usize, request: PlaylistRequest) -> Result<PlaylistResult> {
        let PlaylistRequest {
            algorithm,
            name,
            tracks,
            count,
            artist_spacing,
            range,
            from,
            to,
        } = request;

        let picked = match algorithm {
            PlaylistAlgorithm::Random => {
                let mut source = self.shuffle_source(user_id, tracks)?;
                shuffle(&mut source, &mut rand::rng());
                truncated(source, count)
            }
            PlaylistAlgorithm::Smart => {
                let source = self.shuffle_source(user_id, tracks)?;
                let spacing = artist_spacing.unwrap_or(DEFAULT_ARTIST_SPACING);
                truncated(smart_shuffle(source, spacing, &mut rand::rng()), count)
            }
            PlaylistAlgorithm::TopTracks => self
                .top_tracks
                .build(user_id, range.unwrap_or_default())?
                .into_iter()
                .map(|ranked| ranked.track)
                .collect(),
            PlaylistAlgorithm::History => self
                .capture
                .build(user_id, count, from, to)?
                .into_iter()
                .map(|entry| entry.track)
                .collect(),
        };

        Ok(PlaylistResult {
            name: name.unwrap_or_else(|| default_name(algorithm).to_string()),
            algorithm,
            tracks: picked,
        })
    }

    fn shuffle_source(
        &self,
        user_id: usize,
        explicit: Option<Vec<TrackRef>>,
    ) -> Result<Vec<TrackRef>> {
        if let Some(tracks) = explicit.filter(|tracks| !tracks.is_empty()) {
            return Ok(tracks);
        }
        Ok(self
            .history
            .recent_tracks(user_id, None, None, DEFAULT_SOURCE_COUNT)?
            .into_iter()
            .map(|entry| entry.track)
            .collect())
    }
}

fn truncated(mut tracks: Vec<TrackRef>, count: Option<usize>) -> Vec<TrackRef> {
    if let Some(count) = count {
        tracks.truncate(count);
    }
    tracks
}

fn default_name(algorithm: PlaylistAlgorithm) -> &'static str {
    match algorithm {
        PlaylistAlgorithm::Random => "Shuffled mix",
        PlaylistAlgorithm::Smart => "Smart shuffle",
        PlaylistAlgorithm::TopTracks => "Top tracks",
        PlaylistAlgorithm::History => "Recently played",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{PlayEvent, SqliteHistoryStore};
    use chrono::DateTime;

    fn track(name: &str, artist: &str) -> TrackRef {
        TrackRef::new(name.to_string(), artist.to_string(), None)
    }

    fn request(algorithm: PlaylistAlgorithm) -> PlaylistRequest {
        PlaylistRequest {
            algorithm,
            name: None,
            tracks: None,
            count: None,
            artist_spacing: None,
            range: None,
            from: None,
            to: None,
        }
    }

    fn generator_with_plays(plays: &[(&str, &str, i64)]) -> PlaylistGenerator {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        for (name, artist, secs) in plays {
            store
                .insert_play(
                    1,
                    &PlayEvent {
                        track: track(name, artist),
                        played_at: DateTime::from_timestamp(*secs, 0).unwrap(),
                        ms_played: 60_000,
                    },
                    None,
                )
                .unwrap();
        }
        PlaylistGenerator::new(store)
    }

    #[test]
    fn random_shuffles_an_explicit_pool() {
        let generator = generator_with_plays(&[]);
        let pool = vec![track("a", "A"), track("b", "B"), track("c", "C")];
        let result = generator
            .generate(
                1,
                PlaylistRequest {
                    tracks: Some(pool.clone()),
                    ..request(PlaylistAlgorithm::Random)
                },
            )
            .unwrap();

        assert_eq!(result.name, "Shuffled mix");
        assert_eq!(result.algorithm, PlaylistAlgorithm::Random);
        let mut keys: Vec<&str> = result.tracks.iter().map(|t| t.key.as_str()).collect();
        keys.sort();
        let mut expected: Vec<&str> = pool.iter().map(|t| t.key.as_str()).collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn random_falls_back_to_recent_history() {
        let generator =
            generator_with_plays(&[("One", "A", 1_000), ("Two", "B", 2_000), ("Three", "C", 3_000)]);
        let result = generator.generate(1, request(PlaylistAlgorithm::Random)).unwrap();
        assert_eq!(result.tracks.len(), 3);

        let empty = generator.generate(2, request(PlaylistAlgorithm::Random)).unwrap();
        assert!(empty.tracks.is_empty());
    }

    #[test]
    fn count_caps_shuffled_playlists() {
        let generator = generator_with_plays(&[]);
        let pool: Vec<TrackRef> = (0..10).map(|i| track(&format!("t{}", i), "A")).collect();
        let result = generator
            .generate(
                1,
                PlaylistRequest {
                    tracks: Some(pool),
                    count: Some(4),
                    ..request(PlaylistAlgorithm::Random)
                },
            )
            .unwrap();
        assert_eq!(result.tracks.len(), 4);
    }

    #[test]
    fn smart_spaces_artists_apart() {
        let generator = generator_with_plays(&[]);
        let pool = vec![
            track("a1", "A"),
            track("a2", "A"),
            track("a3", "A"),
            track("b1", "B"),
        ];
        let result = generator
            .generate(
                1,
                PlaylistRequest {
                    tracks: Some(pool),
                    artist_spacing: Some(1),
                    ..request(PlaylistAlgorithm::Smart)
                },
            )
            .unwrap();

        assert_eq!(result.name, "Smart shuffle");
        assert_eq!(result.tracks.len(), 4);
        assert_eq!(result.tracks[0].artist, "A");
        assert_eq!(result.tracks[1].artist, "B");
    }

    #[test]
    fn top_tracks_playlist_is_ranked() {
        let now = chrono::Utc::now().timestamp();
        let generator = generator_with_plays(&[
            ("Favorite", "A", now - 4_000),
            ("Favorite", "A", now - 2_000),
            ("OneOff", "B", now - 3_000),
        ]);
        let result = generator
            .generate(1, request(PlaylistAlgorithm::TopTracks))
            .unwrap();
        assert_eq!(result.name, "Top tracks");
        assert_eq!(result.tracks[0].name, "Favorite");
        assert_eq!(result.tracks.len(), 2);
    }

    #[test]
    fn history_playlist_is_most_recent_first() {
        let generator =
            generator_with_plays(&[("One", "A", 1_000), ("Two", "B", 2_000), ("One", "A", 3_000)]);
        let result = generator
            .generate(
                1,
                PlaylistRequest {
                    count: Some(10),
                    ..request(PlaylistAlgorithm::History)
                },
            )
            .unwrap();
        assert_eq!(result.name, "Recently played");
        let names: Vec<&str> = result.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);
    }

    #[test]
    fn explicit_name_wins() {
        let generator = generator_with_plays(&[]);
        let result = generator
            .generate(
                1,
                PlaylistRequest {
                    name: Some("Road trip".to_string()),
                    tracks: Some(vec![track("a", "A")]),
                    ..request(PlaylistAlgorithm::Random)
                },
            )
            .unwrap();
        assert_eq!(result.name, "Road trip");
    }
}
