use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::wire::{ProgressReply, WireStatus};

/// URLs containing this marker fail after their first progress report
pub const FAIL_MARKER: &str = "unavailable";
pub const FAIL_MESSAGE: &str = "video unavailable";

/// A job the stub pretends to work on
#[derive(Debug, Clone)]
pub struct StubJob {
    pub url: String,
    pub audio_only: bool,
    /// Progress requests answered so far
    pub polls: usize,
    pub filename: String,
}

impl StubJob {
    pub fn should_fail(&self) -> bool {
        self.url.contains(FAIL_MARKER)
    }
}

/// Progress reports handed out before a job turns ready
#[derive(Debug, Clone)]
pub struct StubScript {
    pub steps: Vec<ProgressReply>,
}

impl Default for StubScript {
    fn default() -> Self {
        Self {
            steps: vec![
                ProgressReply::status(WireStatus::Waiting, 0.0).with_rate("0 KiB/s", "00:00"),
                ProgressReply::status(WireStatus::Downloading, 25.0).with_rate("1.2MiB/s", "00:09"),
                ProgressReply::status(WireStatus::Downloading, 50.0).with_rate("1.2MiB/s", "00:06"),
                ProgressReply::status(WireStatus::Downloading, 75.0).with_rate("1.3MiB/s", "00:03"),
                ProgressReply::status(WireStatus::Downloading, 100.0).with_rate("1.3MiB/s", "00:00"),
                ProgressReply::status(WireStatus::Converting, 100.0).with_rate("1.3MiB/s", "00:00"),
            ],
        }
    }
}

impl StubScript {
    /// Reply for the `poll`-th progress request of `job`
    pub fn reply_for(&self, job: &StubJob, poll: usize) -> ProgressReply {
        if job.should_fail() && poll >= 1 {
            return ProgressReply::failed(FAIL_MESSAGE);
        }

        match self.steps.get(poll) {
            Some(step) => step.clone(),
            None => ProgressReply::ready(job.filename.clone()).with_rate("0 KiB/s", "00:00"),
        }
    }
}

#[derive(Clone, Default)]
pub struct StubState {
    pub jobs: Arc<RwLock<HashMap<String, StubJob>>>,
    pub script: Arc<StubScript>,
}

impl StubState {
    pub fn new(script: StubScript) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            script: Arc::new(script),
        }
    }
}
