//! Common error types for cratematch

use thiserror::Error;

/// Common result type for cratematch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the pipeline core and its transport clients
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A job submission conflicts with a job already in flight
    #[error("Job conflict: {0}")]
    Conflict(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed or out-of-order stream message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection-level failure talking to the matching server
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON encode/decode error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Completion collaborator (catalog re-fetch) failure
    #[error("Catalog refresh failed: {0}")]
    Completion(String),
}
