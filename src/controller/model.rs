use std::fmt;
use time::OffsetDateTime;

use super::error::JobError;
use crate::wire::WireStatus;

/// Opaque job identifier issued by the service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filename/token naming a finished artifact on the service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(filename: impl Into<String>) -> Self {
        Self(filename.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> ArtifactKind {
        if self.0.to_ascii_lowercase().ends_with(".mp3") {
            ArtifactKind::Audio
        } else {
            ArtifactKind::Video
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Video,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Audio => "audio",
            ArtifactKind::Video => "video",
        }
    }
}

/// Where and until when a finished artifact can be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalLink {
    pub url: String,
    pub artifact: ArtifactRef,
    pub kind: ArtifactKind,
    /// The service deletes the artifact after its retention window; informational only
    pub expires_at: OffsetDateTime,
}

/// Lifecycle state of a job
///
/// The terminal variants carry their payload, so an artifact and an error can
/// never be recorded for the same job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Waiting,
    Downloading,
    Converting,
    Ready(ArtifactRef),
    Error(JobError),
}

impl JobStatus {
    /// Non-terminal status for a wire value; `ready` needs an artifact and maps to `None`
    pub fn active(status: WireStatus) -> Option<Self> {
        match status {
            WireStatus::Waiting => Some(JobStatus::Waiting),
            WireStatus::Downloading => Some(JobStatus::Downloading),
            WireStatus::Converting => Some(JobStatus::Converting),
            WireStatus::Ready => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready(_) | JobStatus::Error(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Downloading => "downloading",
            JobStatus::Converting => "converting",
            JobStatus::Ready(_) => "ready",
            JobStatus::Error(_) => "error",
        }
    }

    /// Heading a front end shows for this status
    pub fn headline(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "Preparing download...",
            JobStatus::Downloading => "Downloading...",
            JobStatus::Converting => "Converting...",
            JobStatus::Ready(_) => "Download ready!",
            JobStatus::Error(_) => "Download failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_SPEED: &str = "0 KiB/s";
pub const DEFAULT_ETA: &str = "00:00";

/// The single job a controller tracks
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    /// Unset until the service accepts the submission
    pub id: Option<JobId>,
    pub source_url: String,
    pub audio_only: bool,
    pub status: JobStatus,
    /// 0..=100, meaningful while the job is not terminal
    pub progress_percent: f64,
    /// Display strings supplied by the service
    pub speed: String,
    pub eta: String,
}

impl Default for DownloadJob {
    fn default() -> Self {
        Self {
            id: None,
            source_url: String::new(),
            audio_only: false,
            status: JobStatus::Waiting,
            progress_percent: 0.0,
            speed: DEFAULT_SPEED.to_string(),
            eta: DEFAULT_ETA.to_string(),
        }
    }
}

impl DownloadJob {
    pub fn new(source_url: impl Into<String>, audio_only: bool) -> Self {
        Self {
            source_url: source_url.into(),
            audio_only,
            ..Self::default()
        }
    }

    pub fn artifact_ref(&self) -> Option<&ArtifactRef> {
        match &self.status {
            JobStatus::Ready(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.status {
            JobStatus::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
