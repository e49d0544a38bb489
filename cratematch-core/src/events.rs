//! Pipeline event types and broadcast bus
//!
//! Events are broadcast via [`EventBus`] so the frontend (CLI, UI) can render
//! progress and react to lifecycle changes without polling. Emission order is
//! part of the contract: on a terminal result, `BatchSelectionCleared` and
//! `ProgressViewClosed` are always emitted before `AwaitingResolution`, so no
//! consumer ever shows the progress view and the disambiguation view at once.

use crate::model::JobKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted while an import job runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A new job was submitted; prior pipeline state was discarded
    JobSubmitted {
        job_id: Uuid,
        kind: JobKind,
        timestamp: DateTime<Utc>,
    },

    /// Matching progress advanced
    ProgressUpdated {
        job_id: Uuid,
        fraction: f64,
        timestamp: DateTime<Utc>,
    },

    /// The caller-owned batch selection (checkboxed records) should be cleared
    BatchSelectionCleared {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The progress view must close; emitted before match groups are announced
    ProgressViewClosed {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Matching finished with unresolved groups; user disambiguation required
    AwaitingResolution {
        job_id: Uuid,
        album_groups: usize,
        track_groups: usize,
        timestamp: DateTime<Utc>,
    },

    /// The job finished and the canonical record list was refreshed
    JobCompleted {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The job failed; recoverable by resubmission
    JobFailed {
        job_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`PipelineEvent`]
///
/// Thin wrapper over `tokio::sync::broadcast`: non-blocking publish, multiple
/// concurrent subscribers, automatic cleanup when receivers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// A bus with no subscribers is not an error; the event is dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}
