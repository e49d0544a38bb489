//! HTTP collaborators for the import pipeline
//!
//! [`MatchStreamClient`] submits matching jobs and feeds the SSE response
//! stream into the pipeline in arrival order. [`RecordsClient`] is the
//! completion collaborator (canonical record re-fetch) and also carries the
//! track audio-features request for manually matched tracks.

use crate::config::Config;
use crate::sse::SseParser;
use async_trait::async_trait;
use cratematch_core::model::{JobPayload, MatchedTrack};
use cratematch_core::pipeline::{CatalogRefresh, ImportPipeline};
use cratematch_core::{Error, Result};
use futures::StreamExt;
use reqwest::{header, Client};
use tracing::{debug, info, warn};

/// User-Agent for all matching-server requests
const USER_AGENT: &str = concat!("cratematch/", env!("CARGO_PKG_VERSION"));

/// Full-import submission endpoint (form field `records`)
pub const IMPORT_SELECTED_PATH: &str = "/api/spotify_sse/import_selected";
/// Apply-selections submission endpoint (form fields `matchedAlbums`,
/// `matchedTracks`, `unmatchedAlbums`)
pub const IMPORT_MATCHED_PATH: &str = "/api/spotify_sse/import_matched";
/// Canonical record list endpoint
const RECORDS_PATH: &str = "/api/records";
/// Audio-features save endpoint for a manually matched track
const TRACK_FEATURES_PATH: &str = "/api/spotify/track_features";

/// Streaming client for matching jobs
pub struct MatchStreamClient {
    http: Client,
    base_url: String,
}

impl MatchStreamClient {
    /// Build a client from resolved configuration.
    ///
    /// Only the connect phase is bounded by the configured timeout; the SSE
    /// body stays open for the lifetime of the job.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
        })
    }

    /// Submit a job and drive the pipeline with the streamed messages until
    /// the server closes the stream.
    ///
    /// Transport failures surface through the pipeline's error state rather
    /// than as `Err`; the only `Err` paths are submission validation and a
    /// completion collaborator failure.
    pub async fn run_job<C: CatalogRefresh>(
        &self,
        pipeline: &mut ImportPipeline<C>,
        payload: JobPayload,
        token: &str,
    ) -> Result<()> {
        pipeline.submit(payload.clone())?;

        let (path, form) = form_fields(&payload)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Submitting import job");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(token)
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Job submission failed");
                pipeline.handle_transport_error();
                return Ok(());
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Matching server rejected job submission");
            pipeline.handle_transport_error();
            return Ok(());
        }

        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for message in parser.push(&bytes) {
                        pipeline.handle_message(&message).await?;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Event stream read failed");
                    pipeline.handle_transport_error();
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Endpoint and form-urlencoded fields for a job payload.
///
/// List-valued fields are JSON-encoded strings inside the form body, per the
/// server's submission grammar.
fn form_fields(payload: &JobPayload) -> Result<(&'static str, Vec<(&'static str, String)>)> {
    match payload {
        JobPayload::Records(ids) => Ok((
            IMPORT_SELECTED_PATH,
            vec![("records", serde_json::to_string(ids)?)],
        )),
        JobPayload::Selections(selection) => Ok((
            IMPORT_MATCHED_PATH,
            vec![
                ("matchedAlbums", serde_json::to_string(&selection.matched_albums)?),
                ("matchedTracks", serde_json::to_string(&selection.matched_tracks)?),
                (
                    "unmatchedAlbums",
                    serde_json::to_string(&selection.unmatched_albums)?,
                ),
            ],
        )),
    }
}

/// Record-catalog client; the pipeline's completion collaborator
pub struct RecordsClient {
    http: Client,
    base_url: String,
}

impl RecordsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
        })
    }

    /// Fetch and save audio features for a manually matched track
    pub async fn request_track_features(&self, track: &MatchedTrack, token: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, TRACK_FEATURES_PATH);
        let form = [
            ("recordID", track.record_id.as_str()),
            ("trackID", track.track_id.as_str()),
            ("spotifyTrackID", track.spotify_track_id.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "track features request returned {}",
                response.status()
            )));
        }

        info!(track_id = %track.track_id, "Audio features saved");
        Ok(())
    }
}

#[async_trait]
impl CatalogRefresh for RecordsClient {
    async fn refresh(&self, token: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, RECORDS_PATH);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Completion(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Completion(format!(
                "records fetch returned {}",
                response.status()
            )));
        }

        let records: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Completion(e.to_string()))?;
        let count = records.as_array().map(|a| a.len());
        info!(count = ?count, "Canonical record list refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cratematch_core::model::{MatchCandidate, MatchedAlbum, SelectionPayload};

    #[test]
    fn full_import_form_carries_record_ids_as_json() {
        let payload = JobPayload::Records(vec!["R1".to_string(), "R2".to_string()]);
        let (path, form) = form_fields(&payload).unwrap();
        assert_eq!(path, IMPORT_SELECTED_PATH);
        assert_eq!(form, vec![("records", r#"["R1","R2"]"#.to_string())]);
    }

    #[test]
    fn apply_form_carries_all_three_lists() {
        let payload = JobPayload::Selections(SelectionPayload {
            matched_albums: vec![MatchedAlbum {
                record_id: "R1".to_string(),
                album: MatchCandidate {
                    id: "A".to_string(),
                    selected: true,
                    display: serde_json::Map::new(),
                },
            }],
            matched_tracks: vec![MatchedTrack {
                record_id: "R2".to_string(),
                track_id: "T1".to_string(),
                spotify_track_id: "S1".to_string(),
            }],
            unmatched_albums: vec!["R3".to_string()],
        });

        let (path, form) = form_fields(&payload).unwrap();
        assert_eq!(path, IMPORT_MATCHED_PATH);
        assert_eq!(form.len(), 3);
        assert_eq!(form[0].0, "matchedAlbums");
        assert!(form[0].1.contains(r#""recordID":"R1""#));
        assert!(form[1].1.contains(r#""spotifyTrackID":"S1""#));
        assert_eq!(form[2].1, r#"["R3"]"#);
    }
}
