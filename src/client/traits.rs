use async_trait::async_trait;
use thiserror::Error;

use crate::wire::{ProgressReply, SubmitReply, SubmitRequest};

/// Failures below the application protocol: network, timeouts, undecodable bodies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Undecodable response (HTTP {status}): {reason}")]
    Decode { status: u16, reason: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// The conversion service as seen by the controller
///
/// Service-level rejections (`{"error": ...}` bodies) are successful calls;
/// only transport problems surface as `Err`.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a new job (`POST /api/download`)
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReply>;

    /// Fetch the current state of a job (`GET /api/progress/{download_id}`)
    async fn progress(&self, download_id: &str) -> Result<ProgressReply>;

    /// Build the retrieval reference for a finished artifact. Never fetched here.
    fn retrieval_url(&self, filename: &str) -> Result<String>;
}
