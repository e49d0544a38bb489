//! End-to-end pipeline flows driven by raw stream message sequences

use async_trait::async_trait;
use cratematch_core::model::{JobKind, JobPayload};
use cratematch_core::pipeline::{CatalogRefresh, ImportPipeline, JobState};
use cratematch_core::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct CountingRefresh {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CatalogRefresh for CountingRefresh {
    async fn refresh(&self, _token: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn pipeline() -> (ImportPipeline<CountingRefresh>, Arc<AtomicUsize>) {
    let refresher = CountingRefresh::default();
    let calls = refresher.calls.clone();
    (ImportPipeline::new(refresher, "token", 128), calls)
}

async fn drive(p: &mut ImportPipeline<CountingRefresh>, messages: &[&str]) {
    for msg in messages {
        p.handle_message(msg).await.expect("stream message");
    }
}

#[tokio::test]
async fn full_import_with_all_exact_matches_completes() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into(), "R2".into()]))
        .unwrap();

    drive(
        &mut p,
        &[
            "0.3",
            "0.6",
            r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[]}"#,
            "1",
        ],
    )
    .await;

    assert_eq!(p.state(), JobState::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_phase_import_with_disambiguation() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into(), "R2".into(), "R3".into()]))
        .unwrap();
    assert_eq!(p.job().unwrap().kind, JobKind::FullImport);

    // Phase 1: matching resolves R2 exactly; R1 needs album disambiguation,
    // T1 on R3 needs track disambiguation.
    drive(
        &mut p,
        &[
            "0.25",
            "0.75",
            r#"json:{
                "inexactAlbumMatches": [
                    {"recordID": "R1", "matches": [
                        {"id": "alb-1", "selected": false, "name": "Kind of Blue"},
                        {"id": "alb-2", "selected": false, "name": "Kind of Blue (Remastered)"}
                    ]}
                ],
                "inexactTrackMatches": [
                    {"recordID": "R3", "trackID": "T1", "options": [
                        {"id": "trk-1", "selected": false},
                        {"id": "trk-2", "selected": false}
                    ]}
                ]
            }"#,
        ],
    )
    .await;

    assert_eq!(p.state(), JobState::AwaitingResolution);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // User picks one album, clears it, picks the other, and picks a track.
    p.toggle_album_option("R1", "alb-1");
    p.toggle_album_option("R1", "alb-1");
    p.toggle_album_option("R1", "alb-2");
    p.toggle_track_option("T1", "trk-2");

    let payload = p.selection();
    assert_eq!(payload.matched_albums.len(), 1);
    assert_eq!(payload.matched_albums[0].album.id, "alb-2");
    assert!(payload.unmatched_albums.is_empty());
    assert_eq!(payload.matched_tracks[0].spotify_track_id, "trk-2");

    // Phase 2: apply the selections.
    p.submit(JobPayload::Selections(payload)).unwrap();
    assert_eq!(p.job().unwrap().kind, JobKind::ApplySelections);

    drive(
        &mut p,
        &[
            "0.5",
            r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[]}"#,
            "1",
        ],
    )
    .await;

    assert_eq!(p.state(), JobState::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn apply_phase_completes_on_progress_alone() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into()])).unwrap();
    drive(
        &mut p,
        &[
            "0.5",
            r#"json:{"inexactAlbumMatches":[{"recordID":"R1","matches":[{"id":"A","selected":false}]}],"inexactTrackMatches":[]}"#,
        ],
    )
    .await;

    p.toggle_album_option("R1", "A");
    p.submit(JobPayload::Selections(p.selection())).unwrap();

    // The apply run resolves everything and sends no terminal result; the
    // full progress fraction is the completion signal.
    drive(&mut p, &["0.5", "1"]).await;

    assert_eq!(p.state(), JobState::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn apply_job_can_return_remaining_track_groups() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into()])).unwrap();
    drive(
        &mut p,
        &[
            "0.5",
            r#"json:{"inexactAlbumMatches":[{"recordID":"R1","matches":[{"id":"A","selected":false}]}],"inexactTrackMatches":[]}"#,
        ],
    )
    .await;

    p.toggle_album_option("R1", "A");
    p.submit(JobPayload::Selections(p.selection())).unwrap();

    // The apply run surfaces track-level groups for the newly matched album.
    drive(
        &mut p,
        &[
            "0.5",
            r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[{"recordID":"R1","trackID":"T1","options":[{"id":"S1","selected":false}]}]}"#,
        ],
    )
    .await;

    assert_eq!(p.state(), JobState::AwaitingResolution);
    assert_eq!(p.matches().tracks().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_error_mid_stream_is_recoverable() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into()])).unwrap();
    drive(&mut p, &["0.4", "Error: catalog unavailable"]).await;

    assert_eq!(p.state(), JobState::Error);
    assert_eq!(
        p.job().unwrap().last_error.as_deref(),
        Some("catalog unavailable")
    );

    // Retry is a fresh submission driven by the caller.
    p.submit(JobPayload::Records(vec!["R1".into()])).unwrap();
    drive(
        &mut p,
        &[
            "0.5",
            r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[]}"#,
        ],
    )
    .await;
    assert_eq!(p.state(), JobState::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_order_terminal_result_fails_the_job() {
    let (mut p, calls) = pipeline();
    p.submit(JobPayload::Records(vec!["R1".into()])).unwrap();
    drive(
        &mut p,
        &[r#"json:{"inexactAlbumMatches":[],"inexactTrackMatches":[]}"#],
    )
    .await;

    assert_eq!(p.state(), JobState::Error);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
