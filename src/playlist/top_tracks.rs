use super::models::StatsRange;
use crate::history::{HistoryStore, RankedTrack};
use anyhow::Result;
use std::sync::Arc;

pub const TOP_TRACKS_LIMIT: usize = 50;

/// Builds most-played rankings straight from the history store.
pub struct TopTracksBuilder {
    history: Arc<dyn HistoryStore>,
}

impl TopTracksBuilder {
    pub fn new(history: Arc<dyn HistoryStore>) -> TopTracksBuilder {
        TopTracksBuilder { history }
    }

    pub fn build(&self, user_id: usize, range: StatsRange) -> Result<Vec<RankedTrack>> {
        self.history
            .top_tracks(user_id, range.cutoff(chrono::Utc::now()), TOP_TRACKS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{PlayEvent, SqliteHistoryStore, TrackRef};
    use chrono::{DateTime, Utc};

    fn play(store: &SqliteHistoryStore, name: &str, secs: i64) {
        store
            .insert_play(
                1,
                &PlayEvent {
                    track: TrackRef::new(name.to_string(), "Band".to_string(), None),
                    played_at: DateTime::from_timestamp(secs, 0).unwrap(),
                    ms_played: 180_000,
                },
                None,
            )
            .unwrap();
    }

    #[test]
    fn ranks_by_play_count() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let now = Utc::now().timestamp();
        for i in 0..3 {
            play(&store, "Favorite", now - 3600 - i * 120);
        }
        play(&store, "OneOff", now - 3600);

        let builder = TopTracksBuilder::new(store);
        let ranked = builder.build(1, StatsRange::AllTime).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].track.name, "Favorite");
        assert_eq!(ranked[0].play_count, 3);
    }

    #[test]
    fn range_excludes_old_plays() {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let now = Utc::now().timestamp();
        play(&store, "Recent", now - 3600);
        // Well outside four weeks.
        play(&store, "Ancient", now - 90 * 24 * 3600);

        let builder = TopTracksBuilder::new(store);
        let ranked = builder.build(1, StatsRange::LastFourWeeks).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].track.name, "Recent");

        let all = builder.build(1, StatsRange::AllTime).unwrap();
        assert_eq!(all.len(), 2);
    }
}
