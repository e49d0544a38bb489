//! Import job lifecycle and stream-driven state machine
//!
//! One [`ImportPipeline`] instance owns one caller session: the active
//! [`ImportJob`], its match groups, and the event bus. Stream messages are
//! applied strictly in arrival order by a single task, so stream-driven
//! mutations never overlap; selection toggles only happen in
//! `AwaitingResolution`, after the stream's terminal message, so toggles and
//! stream processing are temporally disjoint.
//!
//! Lifecycle:
//!
//! ```text
//! Idle → Submitting → Running → AwaitingResolution ─(apply job)→ Submitting ...
//!                        │
//!                        └────→ ApplyingCompletion → Complete
//! Error reachable from Submitting and Running; Complete/Error/
//! AwaitingResolution all accept a fresh submission.
//! ```
//!
//! `Running → ApplyingCompletion` happens on an empty terminal result, or on
//! a full progress fraction during an apply run: an apply run that resolves
//! everything sends only progress messages and no terminal result.

use crate::error::{Error, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::model::{JobKind, JobPayload, MatchReport, SelectionPayload};
use crate::reconcile::ReconciliationState;
use crate::stream::{decode, StreamEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fallback message for empty error payloads and transport failures
const GENERIC_ERROR: &str = "Unexpected error";

/// Completion collaborator: refreshes the caller's canonical record list.
///
/// Invoked exactly once per successful job. Failures are not handled here;
/// they propagate out of [`ImportPipeline::handle_message`] to the caller.
#[async_trait]
pub trait CatalogRefresh: Send + Sync {
    async fn refresh(&self, token: &str) -> Result<()>;
}

/// Import job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// No job submitted yet
    Idle,
    /// Job sent, no stream message received
    Submitting,
    /// Progress messages arriving
    Running,
    /// Terminal result delivered unresolved groups; waiting on the user
    AwaitingResolution,
    /// Running the completion collaborator (record re-fetch)
    ApplyingCompletion,
    /// Job finished and completion ran
    Complete,
    /// Job failed; recoverable by resubmission
    Error,
}

impl JobState {
    /// Terminal states permit a fresh submission, as does parking in
    /// `AwaitingResolution` (the apply job is submitted from there).
    fn accepts_submission(self) -> bool {
        matches!(
            self,
            JobState::Idle | JobState::Complete | JobState::Error | JobState::AwaitingResolution
        )
    }

    /// Stream messages only mutate state while the job is in flight
    fn in_flight(self) -> bool {
        matches!(self, JobState::Submitting | JobState::Running)
    }
}

/// Timestamped record of one state change
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// One matching run
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub payload: JobPayload,
    pub state: JobState,
    /// Fraction complete in [0,1]
    pub progress: f64,
    /// Last error message, preserved for diagnostic display
    pub last_error: Option<String>,
}

/// Stream-driven import pipeline for one caller session
pub struct ImportPipeline<C: CatalogRefresh> {
    job: Option<ImportJob>,
    matches: ReconciliationState,
    /// Ordering check: a terminal result is only accepted after progress
    saw_progress: bool,
    auth_token: String,
    events: EventBus,
    refresher: C,
}

impl<C: CatalogRefresh> ImportPipeline<C> {
    /// Create a pipeline with a completion collaborator and the auth token it
    /// is invoked with.
    pub fn new(refresher: C, auth_token: impl Into<String>, event_capacity: usize) -> Self {
        Self {
            job: None,
            matches: ReconciliationState::new(),
            saw_progress: false,
            auth_token: auth_token.into(),
            events: EventBus::new(event_capacity),
            refresher,
        }
    }

    /// Current lifecycle state (`Idle` before the first submission)
    pub fn state(&self) -> JobState {
        self.job.as_ref().map(|j| j.state).unwrap_or(JobState::Idle)
    }

    /// The active job, if one was submitted
    pub fn job(&self) -> Option<&ImportJob> {
        self.job.as_ref()
    }

    /// Match groups awaiting disambiguation
    pub fn matches(&self) -> &ReconciliationState {
        &self.matches
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Select or deselect an album candidate (see [`ReconciliationState`])
    pub fn toggle_album_option(&mut self, record_id: &str, option_id: &str) {
        self.matches.toggle_album_option(record_id, option_id);
    }

    /// Select or deselect a track option
    pub fn toggle_track_option(&mut self, track_id: &str, option_id: &str) {
        self.matches.toggle_track_option(track_id, option_id);
    }

    /// Apply-phase payload derived from current selections, recomputed on
    /// every call
    pub fn selection(&self) -> SelectionPayload {
        SelectionPayload::from_state(&self.matches)
    }

    /// Submit a new job, discarding all prior pipeline state.
    ///
    /// Rejected with [`Error::Conflict`] while a job is in flight; one active
    /// job per session.
    pub fn submit(&mut self, payload: JobPayload) -> Result<()> {
        let state = self.state();
        if !state.accepts_submission() {
            return Err(Error::Conflict(format!(
                "a job is already in flight (state: {:?})",
                state
            )));
        }

        if let JobPayload::Records(records) = &payload {
            if records.is_empty() {
                return Err(Error::InvalidInput("no records selected".to_string()));
            }
        }

        let job_id = Uuid::new_v4();
        let kind = payload.kind();
        self.matches.clear();
        self.saw_progress = false;
        self.job = Some(ImportJob {
            job_id,
            kind,
            payload,
            state: JobState::Submitting,
            progress: 0.0,
            last_error: None,
        });

        info!(job_id = %job_id, kind = ?kind, "Import job submitted");
        self.events.emit(PipelineEvent::JobSubmitted {
            job_id,
            kind,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Apply one inbound stream message.
    ///
    /// Must be called in arrival order. Malformed or out-of-order messages
    /// degrade to the error transition and return `Ok`; the only `Err` path
    /// is a completion collaborator failure, which is the caller's to handle.
    pub async fn handle_message(&mut self, raw: &str) -> Result<()> {
        match decode(raw) {
            StreamEvent::Progress(fraction) => {
                if let Some((job_id, kind)) = self.on_progress(fraction) {
                    // Full progress on an apply run is its completion signal;
                    // the progress view closes just as on a terminal result.
                    self.events.emit(PipelineEvent::ProgressViewClosed {
                        job_id,
                        timestamp: Utc::now(),
                    });
                    return self.run_completion(job_id, kind).await;
                }
                Ok(())
            }
            StreamEvent::TerminalResult(report) => self.on_terminal(report).await,
            StreamEvent::Error(message) => {
                self.on_error(message);
                Ok(())
            }
        }
    }

    /// Connection drop or timeout while the job is in flight.
    ///
    /// Treated identically to a generic error event. The pipeline never
    /// retries; recovery is a fresh submission.
    pub fn handle_transport_error(&mut self) {
        if self.state().in_flight() {
            self.on_error(String::new());
        } else {
            debug!(state = ?self.state(), "Transport error outside an active job ignored");
        }
    }

    /// Returns the job identity when full progress on an apply run requires
    /// the completion sequence; an apply run that resolves everything never
    /// sends a terminal result.
    fn on_progress(&mut self, fraction: f64) -> Option<(Uuid, JobKind)> {
        if !self.state().in_flight() {
            debug!(state = ?self.state(), fraction, "Progress message outside an active job ignored");
            return None;
        }

        if self.state() == JobState::Submitting {
            self.transition(JobState::Running);
        }
        self.saw_progress = true;

        let job = self.job.as_mut()?;
        job.progress = fraction;
        let job_id = job.job_id;
        let kind = job.kind;
        debug!(job_id = %job_id, fraction, "Matching progress");
        self.events.emit(PipelineEvent::ProgressUpdated {
            job_id,
            fraction,
            timestamp: Utc::now(),
        });

        if kind == JobKind::ApplySelections && fraction >= 1.0 {
            return Some((job_id, kind));
        }
        None
    }

    async fn on_terminal(&mut self, report: MatchReport) -> Result<()> {
        if !self.state().in_flight() {
            warn!(state = ?self.state(), "Terminal result outside an active job ignored");
            return Ok(());
        }

        if !self.saw_progress {
            // Protocol requires at least one progress message first; reject
            // the result rather than accepting it silently.
            warn!("Terminal result received before any progress message");
            self.on_error("Out-of-order result message".to_string());
            return Ok(());
        }

        let (job_id, kind) = match self.job.as_mut() {
            Some(job) => {
                job.progress = 1.0;
                (job.job_id, job.kind)
            }
            None => return Ok(()),
        };

        // Ordering contract: the caller-owned batch selection is cleared and
        // the progress view closed before any match group becomes visible.
        self.events.emit(PipelineEvent::BatchSelectionCleared {
            job_id,
            timestamp: Utc::now(),
        });
        self.events.emit(PipelineEvent::ProgressViewClosed {
            job_id,
            timestamp: Utc::now(),
        });

        let album_groups = report.inexact_album_matches.len();
        let track_groups = report.inexact_track_matches.len();
        self.matches.replace(report);

        if !self.matches.is_empty() {
            info!(
                job_id = %job_id,
                album_groups,
                track_groups,
                "Matching finished with unresolved groups"
            );
            self.transition(JobState::AwaitingResolution);
            self.events.emit(PipelineEvent::AwaitingResolution {
                job_id,
                album_groups,
                track_groups,
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        info!(job_id = %job_id, kind = ?kind, "Matching finished; applying completion");
        self.run_completion(job_id, kind).await
    }

    /// Run the completion collaborator and finish the job.
    ///
    /// On failure the job lands in `Error` with the message preserved, so
    /// caller-driven resubmission stays possible, and the error still
    /// propagates to the caller.
    async fn run_completion(&mut self, job_id: Uuid, kind: JobKind) -> Result<()> {
        self.transition(JobState::ApplyingCompletion);
        if let Err(e) = self.refresher.refresh(&self.auth_token).await {
            let message = e.to_string();
            if let Some(job) = self.job.as_mut() {
                job.last_error = Some(message.clone());
            }
            warn!(job_id = %job_id, kind = ?kind, error = %message, "Completion failed");
            self.transition(JobState::Error);
            self.events.emit(PipelineEvent::JobFailed {
                job_id,
                message,
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        self.transition(JobState::Complete);
        self.events.emit(PipelineEvent::JobCompleted {
            job_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn on_error(&mut self, message: String) {
        if !self.state().in_flight() {
            warn!(state = ?self.state(), message = %message, "Error message outside an active job ignored");
            return;
        }

        let normalized = if message.trim().is_empty() {
            GENERIC_ERROR.to_string()
        } else {
            message
        };

        // Progress fraction and job payload are preserved for diagnostics.
        let job_id = match self.job.as_mut() {
            Some(job) => {
                job.last_error = Some(normalized.clone());
                job.job_id
            }
            None => return,
        };

        warn!(job_id = %job_id, error = %normalized, "Import job failed");
        self.transition(JobState::Error);
        self.events.emit(PipelineEvent::JobFailed {
            job_id,
            message: normalized,
            timestamp: Utc::now(),
        });
    }

    fn transition(&mut self, new_state: JobState) -> Option<StateTransition> {
        let job = self.job.as_mut()?;
        let transition = StateTransition {
            job_id: job.job_id,
            old_state: job.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        debug!(
            job_id = %job.job_id,
            old_state = ?transition.old_state,
            new_state = ?new_state,
            "Job state transition"
        );
        job.state = new_state;
        Some(transition)
    }
}
