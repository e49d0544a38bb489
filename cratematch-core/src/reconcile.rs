//! Inexact match reconciliation
//!
//! Holds the album- and track-level match groups received in a terminal
//! result and applies the caller's selection toggles. Toggles work like radio
//! buttons that can also deselect: picking an unselected option selects it
//! and clears its siblings; picking the selected option again clears the
//! whole group, leaving nothing selected.

use crate::model::{InexactAlbumMatch, InexactTrackMatch, MatchCandidate, MatchReport};
use tracing::debug;

/// Match groups awaiting user disambiguation
#[derive(Debug, Clone, Default)]
pub struct ReconciliationState {
    albums: Vec<InexactAlbumMatch>,
    tracks: Vec<InexactTrackMatch>,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all groups with the contents of a terminal-result report
    pub fn replace(&mut self, report: MatchReport) {
        self.albums = report.inexact_album_matches;
        self.tracks = report.inexact_track_matches;
    }

    /// Discard all groups (new job submission, or state consumed)
    pub fn clear(&mut self) {
        self.albums.clear();
        self.tracks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty() && self.tracks.is_empty()
    }

    pub fn albums(&self) -> &[InexactAlbumMatch] {
        &self.albums
    }

    pub fn tracks(&self) -> &[InexactTrackMatch] {
        &self.tracks
    }

    /// Select or deselect an album candidate.
    ///
    /// No-op when the record or option is absent. Guarantees at most one
    /// selected candidate per group; the deselect-all step always precedes
    /// the select step, so two candidates are never selected at once, even
    /// transiently.
    pub fn toggle_album_option(&mut self, record_id: &str, option_id: &str) {
        match self.albums.iter_mut().find(|g| g.record_id == record_id) {
            Some(group) => toggle_in_group(&mut group.matches, option_id),
            None => debug!(record_id = %record_id, "Toggle for unknown album group ignored"),
        }
    }

    /// Select or deselect a track option; same algorithm as
    /// [`Self::toggle_album_option`], keyed by track identifier.
    pub fn toggle_track_option(&mut self, track_id: &str, option_id: &str) {
        match self.tracks.iter_mut().find(|g| g.track_id == track_id) {
            Some(group) => toggle_in_group(&mut group.options, option_id),
            None => debug!(track_id = %track_id, "Toggle for unknown track group ignored"),
        }
    }
}

fn toggle_in_group(candidates: &mut [MatchCandidate], option_id: &str) {
    let Some(target) = candidates.iter().position(|c| c.id == option_id) else {
        debug!(option_id = %option_id, "Toggle for unknown option ignored");
        return;
    };

    let was_selected = candidates[target].selected;
    for candidate in candidates.iter_mut() {
        candidate.selected = false;
    }
    if !was_selected {
        candidates[target].selected = true;
    }
}
