use std::sync::Arc;
use tracing::{info, warn};

use super::error::{JobError, Stage};
use super::model::JobId;
use crate::client::JobService;
use crate::observability::Metrics;
use crate::wire::{SubmitReply, SubmitRequest};

/// Submits new jobs; knows nothing about session state
pub struct JobInitiator {
    service: Arc<dyn JobService>,
    metrics: Arc<Metrics>,
}

impl JobInitiator {
    pub fn new(service: Arc<dyn JobService>, metrics: Arc<Metrics>) -> Self {
        Self { service, metrics }
    }

    /// Check the source URL without touching the network
    pub fn validate(source_url: &str) -> Result<&str, JobError> {
        let url = source_url.trim();
        if url.is_empty() {
            return Err(JobError::InvalidInput);
        }
        Ok(url)
    }

    /// Issue one submit request and interpret the reply. Never retries.
    pub async fn submit(&self, source_url: &str, audio_only: bool) -> Result<JobId, JobError> {
        let url = Self::validate(source_url)?;
        let request = SubmitRequest {
            url: url.to_string(),
            audio_only,
        };

        self.metrics.job_submitted();
        let reply = match self.service.submit(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(url, error = %e, "Submit request failed");
                self.metrics.job_failed();
                return Err(JobError::transport(Stage::Submit, &e));
            }
        };

        match interpret(reply) {
            Ok(job_id) => {
                info!(%job_id, url, audio_only, "Job accepted");
                Ok(job_id)
            }
            Err(error) => {
                warn!(url, code = error.code(), error = %error, "Job not accepted");
                match error {
                    JobError::Rejected(_) => self.metrics.job_rejected(),
                    _ => self.metrics.job_failed(),
                }
                Err(error)
            }
        }
    }
}

/// An `error` member wins over any id that may also be present
fn interpret(reply: SubmitReply) -> Result<JobId, JobError> {
    match (reply.error, reply.download_id) {
        (Some(message), _) => Err(JobError::Rejected(message)),
        (None, Some(id)) if !id.is_empty() => Ok(JobId::new(id)),
        (None, _) => Err(JobError::malformed(
            Stage::Submit,
            "submit reply carried neither download_id nor error",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ScriptedService, TransportError};

    fn initiator(service: Arc<ScriptedService>) -> (JobInitiator, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        (JobInitiator::new(service, metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn test_empty_url_never_reaches_service() {
        let service = Arc::new(ScriptedService::new());
        let (initiator, metrics) = initiator(service.clone());

        assert_eq!(initiator.submit("", false).await, Err(JobError::InvalidInput));
        assert_eq!(initiator.submit("   ", true).await, Err(JobError::InvalidInput));
        assert_eq!(service.submit_calls(), 0);
        assert_eq!(metrics.snapshot().jobs_submitted, 0);
    }

    #[tokio::test]
    async fn test_accepted_submission_returns_id() {
        let service = Arc::new(ScriptedService::new());
        service.push_submit(Ok(SubmitReply::accepted("123"))).await;
        let (initiator, _) = initiator(service.clone());

        let id = initiator.submit(" https://youtu.be/abc ", true).await.unwrap();

        assert_eq!(id, JobId::new("123"));
        let sent = service.submitted().await;
        assert_eq!(
            sent,
            vec![SubmitRequest {
                url: "https://youtu.be/abc".to_string(),
                audio_only: true
            }]
        );
    }

    #[tokio::test]
    async fn test_rejection_passes_message_through() {
        let service = Arc::new(ScriptedService::new());
        service.push_submit(Ok(SubmitReply::rejected("Unsupported URL"))).await;
        let (initiator, metrics) = initiator(service);

        let err = initiator.submit("https://example.com", false).await.unwrap_err();

        assert_eq!(err, JobError::Rejected("Unsupported URL".into()));
        assert_eq!(metrics.snapshot().jobs_rejected, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let service = Arc::new(ScriptedService::new());
        service
            .push_submit(Err(TransportError::RequestFailed("connection refused".into())))
            .await;
        service.push_submit(Ok(SubmitReply::accepted("never"))).await;
        let (initiator, _) = initiator(service.clone());

        let err = initiator.submit("https://example.com", false).await.unwrap_err();

        assert!(matches!(err, JobError::TransportFailure { stage: Stage::Submit, .. }));
        assert_eq!(service.submit_calls(), 1);
    }

    #[test]
    fn test_error_member_wins_over_id() {
        let reply = SubmitReply {
            download_id: Some("1".into()),
            error: Some("quota exceeded".into()),
        };
        assert_eq!(interpret(reply), Err(JobError::Rejected("quota exceeded".into())));
    }

    #[test]
    fn test_empty_reply_is_malformed() {
        assert!(matches!(
            interpret(SubmitReply::default()),
            Err(JobError::TransportFailure { stage: Stage::Submit, .. })
        ));
        assert!(matches!(
            interpret(SubmitReply::accepted("")),
            Err(JobError::TransportFailure { .. })
        ));
    }
}
