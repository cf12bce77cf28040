//! Artist-aware shuffle.

use super::random::shuffle;
use crate::history::TrackRef;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

struct ArtistGroup {
    last_placed: Option<usize>,
    tracks: VecDeque<TrackRef>,
}

/// Shuffles `tracks`, then lays them out so two tracks by the same artist
/// have at least `artist_spacing` others between them. Every input track is
/// placed: when no artist is eligible for a slot the constraint relaxes for
/// that slot instead of dropping tracks.
pub fn smart_shuffle<R: Rng>(
    tracks: Vec<TrackRef>,
    artist_spacing: usize,
    rng: &mut R,
) -> Vec<TrackRef> {
    let mut pool = tracks;
    shuffle(&mut pool, rng);

    let mut groups: Vec<ArtistGroup> = Vec::new();
    let mut by_artist: HashMap<String, usize> = HashMap::new();
    for track in pool {
        let slot = *by_artist.entry(track.artist.clone()).or_insert_with(|| {
            groups.push(ArtistGroup {
                last_placed: None,
                tracks: VecDeque::new(),
            });
            groups.len() - 1
        });
        groups[slot].tracks.push_back(track);
    }

    let total: usize = groups.iter().map(|group| group.tracks.len()).sum();
    let mut out = Vec::with_capacity(total);
    for position in 0..total {
        let slot = pick_group(&groups, position, artist_spacing)
            .or_else(|| pick_group(&groups, position, 0));
        let Some(slot) = slot else { break };
        let group = &mut groups[slot];
        if let Some(track) = group.tracks.pop_front() {
            group.last_placed = Some(position);
            out.push(track);
        }
    }
    out
}

/// Among groups allowed at `position`, the one with the most tracks left;
/// ties go to the group that has waited longest. Draining big groups early
/// keeps the tail from collapsing into one artist.
fn pick_group(groups: &[ArtistGroup], position: usize, spacing: usize) -> Option<usize> {
    groups
        .iter()
        .enumerate()
        .filter(|(_, group)| !group.tracks.is_empty())
        .filter(|(_, group)| {
            group
                .last_placed
                .map_or(true, |placed| position - placed > spacing)
        })
        .max_by(|(_, a), (_, b)| {
            a.tracks
                .len()
                .cmp(&b.tracks.len())
                .then_with(|| recency_rank(b).cmp(&recency_rank(a)))
        })
        .map(|(slot, _)| slot)
}

fn recency_rank(group: &ArtistGroup) -> usize {
    group.last_placed.map_or(0, |placed| placed + 1)
}
