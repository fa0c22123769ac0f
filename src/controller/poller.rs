//! Progress poller
//!
//! One request at a time per job: the next request is scheduled only after the
//! previous one resolved and its reply was applied, so progress never goes
//! backwards because of reordered replies. Replies are applied through the
//! session's generation guard; a reply for a job that was reset in the
//! meantime is dropped on the floor.

use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, warn};

use super::error::{JobError, Stage};
use super::model::{ArtifactRef, DownloadJob, JobId, JobStatus, RetrievalLink};
use super::session::SessionHandle;
use crate::client::JobService;
use crate::config::PollingConfig;
use crate::observability::Metrics;
use crate::wire::{ProgressReply, WireStatus};

/// Timing of the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Extra attempts after a failed request; 0 ends tracking on the first failure
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval.as_duration(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff.as_duration(),
        }
    }
}

impl PollPolicy {
    /// Exponential backoff: backoff, 2x, 4x, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor)
    }
}

/// Effect of a single reply on the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Still running; poll again after the interval
    Continue,
    Ready(ArtifactRef),
    Failed(JobError),
}

/// How a polling run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(ArtifactRef),
    Failed(JobError),
    /// The session moved on to another job (or idle) while polling
    Superseded,
}

/// Apply one progress reply to the job
///
/// Display fields are copied verbatim (percent clamped to 0..=100). A reply
/// with `error` is terminal whatever else it carries.
pub fn apply_reply(job: &mut DownloadJob, reply: ProgressReply) -> Step {
    if let Some(message) = reply.error {
        let error = JobError::JobFailed(message);
        job.status = JobStatus::Error(error.clone());
        return Step::Failed(error);
    }

    let Some(status) = reply.status else {
        let error = JobError::malformed(Stage::Poll, "progress reply carried neither status nor error");
        job.status = JobStatus::Error(error.clone());
        return Step::Failed(error);
    };

    if let Some(progress) = reply.progress {
        job.progress_percent = progress.clamp(0.0, 100.0);
    }
    if let Some(speed) = reply.speed {
        job.speed = speed;
    }
    if let Some(eta) = reply.eta {
        job.eta = eta;
    }

    match (status, reply.filename) {
        (WireStatus::Ready, Some(filename)) if !filename.is_empty() => {
            let artifact = ArtifactRef::new(filename);
            job.status = JobStatus::Ready(artifact.clone());
            Step::Ready(artifact)
        }
        // Ready without a filename: the artifact is still being published.
        // Status stays at its previous value so observers never see a ready
        // job without an artifact; polling continues.
        (WireStatus::Ready, _) => Step::Continue,
        (active, _) => {
            if let Some(status) = JobStatus::active(active) {
                job.status = status;
            }
            Step::Continue
        }
    }
}

pub struct ProgressPoller {
    service: Arc<dyn JobService>,
    session: SessionHandle,
    policy: PollPolicy,
    artifact_ttl: Duration,
    metrics: Arc<Metrics>,
}

impl ProgressPoller {
    pub fn new(
        service: Arc<dyn JobService>,
        session: SessionHandle,
        policy: PollPolicy,
        artifact_ttl: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            service,
            session,
            policy,
            artifact_ttl,
            metrics,
        }
    }

    /// Poll `job_id` until it reaches a terminal state or `generation` is superseded
    pub async fn run(&self, job_id: JobId, generation: u64) -> PollOutcome {
        let mut failures = 0u32;

        loop {
            if !self.session.is_current(generation) {
                debug!(%job_id, generation, "Polling stopped, job superseded");
                return PollOutcome::Superseded;
            }

            self.metrics.poll_issued();
            let reply = match self.service.progress(job_id.as_str()).await {
                Ok(reply) => {
                    failures = 0;
                    reply
                }
                Err(e) if failures < self.policy.max_retries => {
                    failures += 1;
                    let backoff = self.policy.backoff(failures);
                    warn!(%job_id, attempt = failures, error = %e, ?backoff, "Progress request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => {
                    warn!(%job_id, error = %e, "Progress request failed, giving up on job");
                    return self.fail(generation, JobError::transport(Stage::Poll, &e));
                }
            };

            let applied = self.session.update_if_current(generation, |state| {
                let step = apply_reply(&mut state.job, reply);
                match &step {
                    Step::Continue => {}
                    Step::Ready(artifact) => {
                        state.link = self.retrieval_link(artifact);
                        state.busy = false;
                    }
                    Step::Failed(_) => state.busy = false,
                }
                (step, state.job.status.as_str(), state.job.progress_percent)
            });

            match applied {
                None => {
                    debug!(%job_id, generation, "Dropping progress reply for superseded job");
                    return PollOutcome::Superseded;
                }
                Some((Step::Continue, status, progress)) => {
                    debug!(%job_id, status, progress, "Job in progress");
                    tokio::time::sleep(self.policy.interval).await;
                }
                Some((Step::Ready(artifact), _, _)) => {
                    info!(%job_id, %artifact, "Job ready");
                    self.metrics.job_completed();
                    return PollOutcome::Ready(artifact);
                }
                Some((Step::Failed(error), _, _)) => {
                    warn!(%job_id, code = error.code(), error = %error, "Job failed");
                    self.metrics.job_failed();
                    return PollOutcome::Failed(error);
                }
            }
        }
    }

    fn fail(&self, generation: u64, error: JobError) -> PollOutcome {
        let applied = self.session.update_if_current(generation, |state| {
            state.job.status = JobStatus::Error(error.clone());
            state.busy = false;
        });

        match applied {
            Some(()) => {
                self.metrics.job_failed();
                PollOutcome::Failed(error)
            }
            None => PollOutcome::Superseded,
        }
    }

    fn retrieval_link(&self, artifact: &ArtifactRef) -> Option<RetrievalLink> {
        match self.service.retrieval_url(artifact.as_str()) {
            Ok(url) => Some(RetrievalLink {
                url,
                artifact: artifact.clone(),
                kind: artifact.kind(),
                expires_at: self.expiry(artifact),
            }),
            Err(e) => {
                warn!(%artifact, error = %e, "Could not build retrieval link");
                None
            }
        }
    }

    /// End of the service's retention window; saturates instead of overflowing
    fn expiry(&self, artifact: &ArtifactRef) -> OffsetDateTime {
        time::Duration::try_from(self.artifact_ttl)
            .ok()
            .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
            .unwrap_or_else(|| {
                warn!(%artifact, ttl = ?self.artifact_ttl, "Artifact expiry out of range, saturating");
                PrimitiveDateTime::MAX.assume_utc()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ScriptedService, TransportError};

    fn downloading(progress: f64) -> ProgressReply {
        ProgressReply::status(WireStatus::Downloading, progress).with_rate("1 MiB/s", "00:30")
    }

    fn poller(service: Arc<ScriptedService>, policy: PollPolicy) -> (ProgressPoller, SessionHandle) {
        let session = SessionHandle::new();
        let poller = ProgressPoller::new(
            service,
            session.clone(),
            policy,
            Duration::from_secs(900),
            Arc::new(Metrics::new()),
        );
        (poller, session)
    }

    #[test]
    fn test_apply_copies_fields_verbatim() {
        let mut job = DownloadJob::new("u", false);

        let step = apply_reply(&mut job, downloading(10.0));

        assert_eq!(step, Step::Continue);
        assert_eq!(job.status, JobStatus::Downloading);
        assert_eq!(job.progress_percent, 10.0);
        assert_eq!(job.speed, "1 MiB/s");
        assert_eq!(job.eta, "00:30");
    }

    #[test]
    fn test_apply_error_overrides_status() {
        let mut job = DownloadJob::new("u", false);
        let mut reply = downloading(50.0);
        reply.error = Some("video unavailable".into());

        let step = apply_reply(&mut job, reply);

        assert_eq!(step, Step::Failed(JobError::JobFailed("video unavailable".into())));
        assert_eq!(job.error_message().as_deref(), Some("video unavailable"));
        assert_eq!(job.artifact_ref(), None);
        // Fields from an error reply are not applied
        assert_eq!(job.progress_percent, 0.0);
    }

    #[test]
    fn test_apply_ready_with_filename_is_terminal() {
        let mut job = DownloadJob::new("u", true);

        let step = apply_reply(&mut job, ProgressReply::ready("abc.mp3"));

        assert_eq!(step, Step::Ready(ArtifactRef::new("abc.mp3")));
        assert_eq!(job.artifact_ref().map(ArtifactRef::as_str), Some("abc.mp3"));
        assert_eq!(job.error(), None);
    }

    #[test]
    fn test_apply_ready_without_filename_keeps_polling() {
        let mut job = DownloadJob::new("u", false);
        job.status = JobStatus::Converting;

        let step = apply_reply(&mut job, ProgressReply::status(WireStatus::Ready, 100.0));

        assert_eq!(step, Step::Continue);
        assert_eq!(job.status, JobStatus::Converting);
        assert_eq!(job.progress_percent, 100.0);
    }

    #[test]
    fn test_apply_clamps_progress_and_keeps_missing_fields() {
        let mut job = DownloadJob::new("u", false);
        job.speed = "2 MiB/s".into();

        apply_reply(&mut job, ProgressReply::status(WireStatus::Downloading, 140.0));

        assert_eq!(job.progress_percent, 100.0);
        assert_eq!(job.speed, "2 MiB/s");
    }

    #[test]
    fn test_apply_without_status_is_malformed() {
        let mut job = DownloadJob::new("u", false);

        let step = apply_reply(&mut job, ProgressReply::default());

        assert!(matches!(
            step,
            Step::Failed(JobError::TransportFailure { stage: Stage::Poll, .. })
        ));
        assert!(job.is_terminal());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = PollPolicy {
            retry_backoff: Duration::from_millis(100),
            ..PollPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_ready() {
        let service = Arc::new(ScriptedService::new());
        service.push_progress(Ok(ProgressReply::status(WireStatus::Waiting, 0.0))).await;
        service.push_progress(Ok(downloading(60.0))).await;
        service.push_progress(Ok(ProgressReply::ready("abc.mp4"))).await;
        let (poller, session) = poller(service.clone(), PollPolicy::default());
        let generation = session.begin("https://youtu.be/abc", false).unwrap();

        let outcome = poller.run(JobId::new("123"), generation).await;

        assert_eq!(outcome, PollOutcome::Ready(ArtifactRef::new("abc.mp4")));
        assert_eq!(service.progress_calls(), 3);
        assert_eq!(service.max_in_flight(), 1);
        let state = session.snapshot();
        assert!(!state.busy);
        let link = state.link.unwrap();
        assert_eq!(link.url, "http://scripted.invalid/api/download/abc.mp4");
        assert_eq!(link.kind, crate::controller::ArtifactKind::Video);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_ends_tracking_without_retry() {
        let service = Arc::new(ScriptedService::new());
        service.push_progress(Ok(downloading(5.0))).await;
        service.push_progress(Err(TransportError::Timeout)).await;
        service.push_progress(Ok(downloading(10.0))).await;
        let (poller, session) = poller(service.clone(), PollPolicy::default());
        let generation = session.begin("u", false).unwrap();

        let outcome = poller.run(JobId::new("1"), generation).await;

        assert!(matches!(outcome, PollOutcome::Failed(JobError::TransportFailure { .. })));
        assert_eq!(service.progress_calls(), 2);
        assert_eq!(
            session.snapshot().job.error_message().as_deref(),
            Some("Failed to check download progress")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_recovers_from_blip() {
        let service = Arc::new(ScriptedService::new());
        service.push_progress(Err(TransportError::Timeout)).await;
        service.push_progress(Ok(ProgressReply::ready("abc.mp4"))).await;
        let policy = PollPolicy {
            max_retries: 2,
            ..PollPolicy::default()
        };
        let (poller, session) = poller(service.clone(), policy);
        let generation = session.begin("u", false).unwrap();

        let outcome = poller.run(JobId::new("1"), generation).await;

        assert_eq!(outcome, PollOutcome::Ready(ArtifactRef::new("abc.mp4")));
        assert_eq!(service.progress_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_before_first_request() {
        let service = Arc::new(ScriptedService::new());
        let (poller, session) = poller(service.clone(), PollPolicy::default());
        let generation = session.begin("u", false).unwrap();
        session.reset();

        let outcome = poller.run(JobId::new("1"), generation).await;

        assert_eq!(outcome, PollOutcome::Superseded);
        assert_eq!(service.progress_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_ttl_still_finishes_job() {
        let service = Arc::new(ScriptedService::new());
        service.push_progress(Ok(ProgressReply::ready("a.mp4"))).await;
        let session = SessionHandle::new();
        let poller = ProgressPoller::new(
            service,
            session.clone(),
            PollPolicy::default(),
            Duration::from_millis(u64::MAX),
            Arc::new(Metrics::new()),
        );
        let generation = session.begin("u", false).unwrap();

        let outcome = poller.run(JobId::new("1"), generation).await;

        assert_eq!(outcome, PollOutcome::Ready(ArtifactRef::new("a.mp4")));
        let state = session.snapshot();
        assert!(!state.busy);
        assert_eq!(state.link.unwrap().expires_at, PrimitiveDateTime::MAX.assume_utc());
    }
}
