//! Job lifecycle controller
//!
//! Tracks one conversion job at a time against a [`JobService`]:
//!
//! - [`JobInitiator`] submits the job and obtains its id
//! - [`ProgressPoller`] polls until `ready` or `error`
//! - [`ResetScheduler`] returns to idle a while after the artifact was retrieved
//!
//! All state lives in a [`SessionHandle`] owned by the controller; observers
//! subscribe to it and receive every change.
//!
//! ```rust,ignore
//! let controller = Controller::new(service, ControllerPolicy::default());
//! let mut updates = controller.subscribe();
//! controller.start("https://youtu.be/abc", false).await?;
//! let settled = controller.wait_until_settled().await;
//! ```

mod error;
mod initiator;
mod model;
mod poller;
mod reset;
mod session;

pub use error::{JobError, Stage};
pub use initiator::JobInitiator;
pub use model::{
    ArtifactKind, ArtifactRef, DEFAULT_ETA, DEFAULT_SPEED, DownloadJob, JobId, JobStatus,
    RetrievalLink,
};
pub use poller::{PollOutcome, PollPolicy, ProgressPoller, Step, apply_reply};
pub use reset::ResetScheduler;
pub use session::{SessionHandle, SessionState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::JobService;
use crate::config::Config;
use crate::observability::Metrics;

/// Policy constants of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPolicy {
    pub poll: PollPolicy,
    pub reset_delay: Duration,
    pub artifact_ttl: Duration,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            reset_delay: Duration::from_secs(3),
            artifact_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl From<&Config> for ControllerPolicy {
    fn from(config: &Config) -> Self {
        Self {
            poll: PollPolicy::from(&config.polling),
            reset_delay: config.reset.delay.as_duration(),
            artifact_ttl: config.retention.artifact_ttl.as_duration(),
        }
    }
}

pub struct Controller {
    initiator: JobInitiator,
    poller: Arc<ProgressPoller>,
    reset: ResetScheduler,
    session: SessionHandle,
    polling: Mutex<Option<JoinHandle<PollOutcome>>>,
    metrics: Arc<Metrics>,
}

impl Controller {
    pub fn new(service: Arc<dyn JobService>, policy: ControllerPolicy) -> Self {
        Self::with_metrics(service, policy, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        service: Arc<dyn JobService>,
        policy: ControllerPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        let session = SessionHandle::new();
        let initiator = JobInitiator::new(service.clone(), metrics.clone());
        let poller = Arc::new(ProgressPoller::new(
            service,
            session.clone(),
            policy.poll,
            policy.artifact_ttl,
            metrics.clone(),
        ));
        let reset = ResetScheduler::new(policy.reset_delay, session.clone(), metrics.clone());

        Self {
            initiator,
            poller,
            reset,
            session,
            polling: Mutex::new(None),
            metrics,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.session.snapshot()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Submit a job and, once accepted, start polling it in the background
    ///
    /// An empty source URL fails with [`JobError::InvalidInput`] before
    /// anything else is checked; a job in flight is left as it is. Otherwise
    /// fails with [`JobError::Busy`] while another job is being submitted or
    /// tracked, and with [`JobError::Superseded`] if the controller was reset
    /// while the submission was in flight.
    pub async fn start(&self, source_url: &str, audio_only: bool) -> Result<JobId, JobError> {
        if let Err(error) = JobInitiator::validate(source_url) {
            if !self.session.reject(error.clone()) {
                debug!("Empty source URL while a job is in flight, live job untouched");
            }
            return Err(error);
        }

        let generation = self.session.begin(source_url.trim(), audio_only)?;
        debug!(generation, "Session claimed for new job");

        let job_id = match self.initiator.submit(source_url, audio_only).await {
            Ok(job_id) => job_id,
            Err(error) => {
                let recorded = self.session.update_if_current(generation, |state| {
                    state.job.status = JobStatus::Error(error.clone());
                    state.busy = false;
                });
                return Err(if recorded.is_some() { error } else { JobError::Superseded });
            }
        };

        let attached = self.session.update_if_current(generation, |state| {
            state.job.id = Some(job_id.clone());
        });
        if attached.is_none() {
            info!(%job_id, "Controller reset during submission, not tracking job");
            return Err(JobError::Superseded);
        }

        let poller = self.poller.clone();
        let tracked = job_id.clone();
        let handle = tokio::spawn(async move { poller.run(tracked, generation).await });

        if let Some(previous) = self.polling.lock().await.replace(handle) {
            previous.abort();
        }

        Ok(job_id)
    }

    /// The user acted on the retrieval link: mark it and arm the delayed reset
    ///
    /// Returns the link, or `None` if no ready job is shown.
    pub async fn acknowledge_retrieval(&self) -> Option<RetrievalLink> {
        let generation = self.session.generation();
        let link = self
            .session
            .update_if_current(generation, |state| {
                state.job.artifact_ref()?;
                let link = state.link.clone()?;
                state.retrieved = true;
                Some(link)
            })
            .flatten()?;

        self.reset.arm(generation).await;
        Some(link)
    }

    /// Return to idle immediately, cancelling any polling for the current job
    pub async fn reset(&self) {
        if let Some(handle) = self.polling.lock().await.take() {
            handle.abort();
        }
        let generation = self.session.reset();
        self.metrics.reset_performed();
        info!(generation, "Controller reset");
    }

    /// Wait until no job is being submitted or tracked
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut updates = self.session.subscribe();
        match updates.wait_for(|state| !state.busy).await {
            Ok(state) => state.clone(),
            Err(_) => self.session.snapshot(),
        }
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset.delay()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(handle) = self.polling.get_mut().take() {
            handle.abort();
        }
    }
}
