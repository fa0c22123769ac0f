//! Owned session state plus the observer channel
//!
//! Every mutation goes through a `watch` sender, so observers see each change
//! and a reader never observes a half-applied update. Each job gets a new
//! generation number; writers holding a stale generation are ignored.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::error::JobError;
use super::model::{DownloadJob, JobStatus, RetrievalLink};

/// What observers (the presentation layer) see
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    generation: u64,
    pub job: DownloadJob,
    /// A submission or progress tracking is under way
    pub busy: bool,
    /// The user has acted on the retrieval link
    pub retrieved: bool,
    /// Present while the job is ready
    pub link: Option<RetrievalLink>,
}

impl SessionState {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            job: DownloadJob::default(),
            busy: false,
            retrieved: false,
            link: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Nothing submitted, nothing shown
    pub fn is_idle(&self) -> bool {
        !self.busy && self.job == DownloadJob::default() && self.link.is_none() && !self.retrieved
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::idle(0));
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Apply `f` only while the session still belongs to `generation`
    pub fn update_if_current<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Option<R> {
        let mut result = None;
        self.tx.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            result = Some(f(state));
            true
        });
        if result.is_none() {
            debug!(generation, "Ignoring update for superseded job");
        }
        result
    }

    /// Claim the session for a new job; fails if one is in flight
    pub fn begin(&self, source_url: &str, audio_only: bool) -> Result<u64, JobError> {
        let mut claimed = Err(JobError::Busy);
        self.tx.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            let generation = state.generation + 1;
            *state = SessionState::idle(generation);
            state.job = DownloadJob::new(source_url, audio_only);
            state.busy = true;
            claimed = Ok(generation);
            true
        });
        claimed
    }

    /// Show an error for a submission that never reached the service
    ///
    /// Only the status changes (a shown artifact link is withdrawn with it).
    /// Returns `false`, leaving the session untouched, while a job is busy.
    pub fn reject(&self, error: JobError) -> bool {
        self.tx.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            state.job.status = JobStatus::Error(error);
            state.link = None;
            state.retrieved = false;
            true
        })
    }

    /// Return to idle unconditionally; returns the new generation
    pub fn reset(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|state| {
            next = state.generation + 1;
            *state = SessionState::idle(next);
        });
        next
    }

    /// Return to idle only if nothing newer has started since `generation`
    pub fn reset_if_current(&self, generation: u64) -> bool {
        self.update_if_current(generation, |state| {
            *state = SessionState::idle(generation + 1);
        })
        .is_some()
    }
}
