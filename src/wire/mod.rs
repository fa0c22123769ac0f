//! Wire contract of the remote conversion service
//!
//! Paths are relative to the configured service base URL.

pub mod models;

pub use models::{ProgressReply, SubmitReply, SubmitRequest, WireStatus};

pub const SUBMIT_PATH: &[&str] = &["api", "download"];
pub const PROGRESS_PATH: &[&str] = &["api", "progress"];
pub const RETRIEVE_PATH: &[&str] = &["api", "download"];
