use thiserror::Error;

use crate::client::TransportError;

/// Which exchange a transport failure interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
}

impl Stage {
    fn user_message(&self) -> &'static str {
        match self {
            Stage::Submit => "Failed to start download",
            Stage::Poll => "Failed to check download progress",
        }
    }
}

/// Everything that can end (or refuse) a job
///
/// `Display` is the single human-readable message shown to observers; service
/// messages pass through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Please enter a source URL")]
    InvalidInput,

    #[error("{0}")]
    Rejected(String),

    #[error("{}", .stage.user_message())]
    TransportFailure { stage: Stage, detail: String },

    #[error("{0}")]
    JobFailed(String),

    #[error("A download is already in progress")]
    Busy,

    #[error("Download was cancelled")]
    Superseded,
}

impl JobError {
    pub fn transport(stage: Stage, error: &TransportError) -> Self {
        JobError::TransportFailure {
            stage,
            detail: error.to_string(),
        }
    }

    pub fn malformed(stage: Stage, detail: impl Into<String>) -> Self {
        JobError::TransportFailure {
            stage,
            detail: detail.into(),
        }
    }

    /// Stable code for logs and machine-readable output
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidInput => "INVALID_INPUT",
            JobError::Rejected(_) => "REJECTED",
            JobError::TransportFailure { .. } => "TRANSPORT_FAILURE",
            JobError::JobFailed(_) => "JOB_ERROR",
            JobError::Busy => "BUSY",
            JobError::Superseded => "SUPERSEDED",
        }
    }
}
