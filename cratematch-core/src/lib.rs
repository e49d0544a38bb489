//! # cratematch core
//!
//! Client-side engine for matching a local record catalog ("the crate")
//! against Spotify's catalog. The matching server streams job progress and
//! classified results over an ordered text channel; this crate owns:
//! - Stream message classification (progress / terminal result / error)
//! - Import job lifecycle and progress tracking
//! - Reconciliation of inexact match groups (user disambiguation)
//! - Derivation of the apply-phase selection payload
//!
//! Transport, authentication, and record CRUD live in external collaborators;
//! this crate only defines their interfaces (see [`pipeline::CatalogRefresh`]).

pub mod error;
pub mod events;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod selection;
pub mod stream;

pub use error::{Error, Result};
pub use events::{EventBus, PipelineEvent};
pub use pipeline::{CatalogRefresh, ImportPipeline, JobState};
