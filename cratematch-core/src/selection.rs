//! Selection extraction
//!
//! Pure derivations over [`ReconciliationState`], recomputed on every call
//! (never cached). The three outputs together are the exact and complete
//! payload for the apply-phase job.

use crate::model::{MatchedAlbum, MatchedTrack, SelectionPayload};
use crate::reconcile::ReconciliationState;

/// Album groups with a selected candidate, paired with that candidate
pub fn matched_albums(state: &ReconciliationState) -> Vec<MatchedAlbum> {
    state
        .albums()
        .iter()
        .filter_map(|group| {
            group.selected().map(|album| MatchedAlbum {
                record_id: group.record_id.clone(),
                album: album.clone(),
            })
        })
        .collect()
}

/// Record ids of album groups with no selection
pub fn unmatched_albums(state: &ReconciliationState) -> Vec<String> {
    state
        .albums()
        .iter()
        .filter(|group| group.selected().is_none())
        .map(|group| group.record_id.clone())
        .collect()
}

/// Track groups with a selected option, mapped to the chosen Spotify track id
pub fn matched_tracks(state: &ReconciliationState) -> Vec<MatchedTrack> {
    state
        .tracks()
        .iter()
        .filter_map(|group| {
            group.selected().map(|option| MatchedTrack {
                record_id: group.record_id.clone(),
                track_id: group.track_id.clone(),
                spotify_track_id: option.id.clone(),
            })
        })
        .collect()
}

impl SelectionPayload {
    /// Bundle all three derived lists from current reconciliation state
    pub fn from_state(state: &ReconciliationState) -> Self {
        Self {
            matched_albums: matched_albums(state),
            matched_tracks: matched_tracks(state),
            unmatched_albums: unmatched_albums(state),
        }
    }
}
