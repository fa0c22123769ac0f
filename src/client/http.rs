//! HTTP implementation of the conversion service contract

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::traits::{JobService, Result, TransportError};
use crate::config::ServiceConfig;
use crate::wire::{self, ProgressReply, SubmitReply, SubmitRequest};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("clipfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&ServiceConfig> for HttpConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout.as_duration(),
            request_timeout: config.request_timeout.as_duration(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// reqwest-backed [`JobService`]
pub struct HttpJobService {
    client: Client,
    base_url: Url,
}

impl HttpJobService {
    /// Create a client for the service rooted at `base_url`
    pub fn new(base_url: &str, config: HttpConfig) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(&config.base_url, HttpConfig::from(config))
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReply> {
        let url = self.endpoint(wire::SUBMIT_PATH)?;
        debug!(%url, audio_only = request.audio_only, "Submitting job");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(map_send_error)?;

        decode(response).await
    }

    async fn progress(&self, download_id: &str) -> Result<ProgressReply> {
        let mut segments = wire::PROGRESS_PATH.to_vec();
        segments.push(download_id);
        let url = self.endpoint(&segments)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_send_error)?;

        decode(response).await
    }

    fn retrieval_url(&self, filename: &str) -> Result<String> {
        let mut segments = wire::RETRIEVE_PATH.to_vec();
        segments.push(filename);
        Ok(self.endpoint(&segments)?.to_string())
    }
}

fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::RequestFailed(e.to_string())
    }
}

/// Decode a JSON body whatever the status code; the service reports
/// rejections as 4xx/5xx with an `error` member.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::RequestFailed(format!("Failed to read body: {}", e))
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
        status: status.as_u16(),
        reason: e.to_string(),
    })
}
