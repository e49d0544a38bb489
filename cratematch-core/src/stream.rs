//! Stream message classification
//!
//! The matching server sends one text payload per message, in arrival order:
//!
//! | Prefix      | Meaning         | Payload |
//! |-------------|-----------------|---------|
//! | `Error...`  | failure         | free text, optional `"Error: "` marker |
//! | `json:...`  | terminal result | JSON match report after the first `:`  |
//! | *(numeric)* | progress        | float fraction in [0,1]                |
//!
//! Classification is pure and total: malformed payloads degrade to
//! [`StreamEvent::Error`] rather than panicking or propagating `Err` past the
//! decoder boundary.

use crate::model::MatchReport;
use tracing::warn;

/// Marker prefix for failure messages
const ERROR_MARKER: &str = "Error";
/// Marker prefix for terminal-result messages
const RESULT_MARKER: &str = "json";
/// Full error marker stripped from displayed messages when present
const ERROR_PREFIX: &str = "Error: ";

/// One classified inbound stream message
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Fraction complete in [0,1]
    Progress(f64),
    /// End of the matching phase, carrying unresolved match groups
    TerminalResult(MatchReport),
    /// Failure reported by the server, or a malformed message
    Error(String),
}

/// Classify one inbound text message.
///
/// Messages are checked against the error marker first, then the result
/// marker; anything else must parse as a progress fraction.
pub fn decode(raw: &str) -> StreamEvent {
    if raw.starts_with(ERROR_MARKER) {
        // Only the exact "Error: " marker is stripped; other "Error"-prefixed
        // text is surfaced verbatim.
        let msg = raw.strip_prefix(ERROR_PREFIX).unwrap_or(raw);
        return StreamEvent::Error(msg.to_string());
    }

    if raw.starts_with(RESULT_MARKER) {
        let payload = raw.split_once(':').map(|(_, rest)| rest).unwrap_or("");
        return match serde_json::from_str::<MatchReport>(payload) {
            Ok(report) => StreamEvent::TerminalResult(report),
            Err(e) => {
                warn!(error = %e, "Malformed terminal-result message");
                StreamEvent::Error(format!("Malformed result message: {}", e))
            }
        };
    }

    match raw.trim().parse::<f64>() {
        Ok(f) if f.is_finite() && (0.0..=1.0).contains(&f) => StreamEvent::Progress(f),
        _ => {
            warn!(payload = %raw, "Malformed progress message");
            StreamEvent::Error(format!("Malformed progress message: {:?}", raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marker_is_stripped() {
        assert_eq!(
            decode("Error: catalog unavailable"),
            StreamEvent::Error("catalog unavailable".to_string())
        );
    }

    #[test]
    fn error_without_full_marker_kept_verbatim() {
        assert_eq!(
            decode("Errors occurred during matching"),
            StreamEvent::Error("Errors occurred during matching".to_string())
        );
    }

    #[test]
    fn terminal_result_parses_after_marker() {
        let event = decode(r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[]}"#);
        match event {
            StreamEvent::TerminalResult(report) => assert!(report.is_empty()),
            other => panic!("expected terminal result, got {:?}", other),
        }
    }

    #[test]
    fn terminal_result_with_groups() {
        let event = decode(
            r#"json:{"inexactAlbumMatches":[{"recordID":"R1","matches":[{"id":"A","selected":false}]}],"inexactTrackMatches":[]}"#,
        );
        match event {
            StreamEvent::TerminalResult(report) => {
                assert_eq!(report.inexact_album_matches[0].record_id, "R1");
            }
            other => panic!("expected terminal result, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_degrades_to_error() {
        match decode("json:{not json") {
            StreamEvent::Error(msg) => assert!(msg.starts_with("Malformed result message")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn result_marker_without_colon_degrades_to_error() {
        assert!(matches!(decode("json"), StreamEvent::Error(_)));
    }

    #[test]
    fn progress_parses_in_range() {
        assert_eq!(decode("0.5"), StreamEvent::Progress(0.5));
        assert_eq!(decode("0"), StreamEvent::Progress(0.0));
        assert_eq!(decode("1"), StreamEvent::Progress(1.0));
    }

    #[test]
    fn non_numeric_progress_degrades_to_error() {
        assert!(matches!(decode("almost done"), StreamEvent::Error(_)));
        assert!(matches!(decode(""), StreamEvent::Error(_)));
    }

    #[test]
    fn out_of_range_progress_degrades_to_error() {
        assert!(matches!(decode("1.5"), StreamEvent::Error(_)));
        assert!(matches!(decode("-0.1"), StreamEvent::Error(_)));
        assert!(matches!(decode("NaN"), StreamEvent::Error(_)));
    }
}
