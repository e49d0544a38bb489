//! Wire types shared with the matching server
//!
//! Field names follow the server's JSON grammar exactly (`recordID`,
//! `trackID`, `spotifyTrackID`, `inexactAlbumMatches`, ...). Record, track,
//! and candidate identifiers are server-issued opaque strings.

use serde::{Deserialize, Serialize};

/// One candidate option within a match group.
///
/// Owned exclusively by its parent group; never shared across groups.
/// Display metadata (album/track name, artist, cover art) is opaque to the
/// pipeline and round-trips to the server untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(flatten)]
    pub display: serde_json::Map<String, serde_json::Value>,
}

/// A local record awaiting album-level disambiguation.
///
/// Invariant: at most one candidate in `matches` is selected at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InexactAlbumMatch {
    #[serde(rename = "recordID")]
    pub record_id: String,
    pub matches: Vec<MatchCandidate>,
}

impl InexactAlbumMatch {
    /// The currently selected candidate, if any
    pub fn selected(&self) -> Option<&MatchCandidate> {
        self.matches.iter().find(|c| c.selected)
    }
}

/// A local track awaiting track-level disambiguation.
///
/// Same single-selection invariant as [`InexactAlbumMatch`], scoped to
/// `options` and keyed by track identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InexactTrackMatch {
    #[serde(rename = "recordID")]
    pub record_id: String,
    #[serde(rename = "trackID")]
    pub track_id: String,
    pub options: Vec<MatchCandidate>,
}

impl InexactTrackMatch {
    /// The currently selected option, if any
    pub fn selected(&self) -> Option<&MatchCandidate> {
        self.options.iter().find(|c| c.selected)
    }
}

/// Terminal-result payload: the match groups left unresolved after a job's
/// matching phase (each possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    #[serde(rename = "inexactAlbumMatches", default)]
    pub inexact_album_matches: Vec<InexactAlbumMatch>,
    #[serde(rename = "inexactTrackMatches", default)]
    pub inexact_track_matches: Vec<InexactTrackMatch>,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.inexact_album_matches.is_empty() && self.inexact_track_matches.is_empty()
    }
}

/// A record resolved to a chosen album candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAlbum {
    #[serde(rename = "recordID")]
    pub record_id: String,
    pub album: MatchCandidate,
}

/// A track resolved to a chosen Spotify track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTrack {
    #[serde(rename = "recordID")]
    pub record_id: String,
    #[serde(rename = "trackID")]
    pub track_id: String,
    #[serde(rename = "spotifyTrackID")]
    pub spotify_track_id: String,
}

/// Complete payload for the second-phase apply job.
///
/// Derived from reconciliation state on demand; see [`crate::selection`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionPayload {
    #[serde(rename = "matchedAlbums")]
    pub matched_albums: Vec<MatchedAlbum>,
    #[serde(rename = "matchedTracks")]
    pub matched_tracks: Vec<MatchedTrack>,
    #[serde(rename = "unmatchedAlbums")]
    pub unmatched_albums: Vec<String>,
}

/// Kind of matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// First phase: submit selected record ids for fuzzy matching
    FullImport,
    /// Second phase: apply previously resolved selections
    ApplySelections,
}

/// Input payload of an import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobPayload {
    /// Record identifiers for a full import
    Records(Vec<String>),
    /// Resolved selections for an apply run
    Selections(SelectionPayload),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Records(_) => JobKind::FullImport,
            JobPayload::Selections(_) => JobKind::ApplySelections,
        }
    }
}
