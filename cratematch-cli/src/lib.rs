//! cratematch transport and CLI support
//!
//! HTTP/SSE collaborators for the pipeline core: job submission against the
//! matching server, the record re-fetch completion collaborator, SSE frame
//! parsing, and configuration resolution.

pub mod client;
pub mod config;
pub mod sse;
