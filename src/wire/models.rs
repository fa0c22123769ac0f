//! JSON bodies exchanged with the conversion service.
//!
//! Submit (`POST /api/download`):
//!
//! ```json
//! { "url": "https://youtu.be/abc", "audio_only": false }
//! ```
//!
//! answered with either `{ "download_id": "123" }` or `{ "error": "..." }`.
//!
//! Progress (`GET /api/progress/{download_id}`):
//!
//! ```json
//! {
//!   "progress": 42.5,
//!   "speed": "1.2 MiB/s",
//!   "eta": "00:30",
//!   "status": "downloading",
//!   "filename": null
//! }
//! ```
//!
//! An `error` member overrides everything else in a progress body. The service
//! answers rejections with a non-2xx status *and* one of these bodies, so
//! bodies are decoded regardless of HTTP status.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/download`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    #[serde(default)]
    pub audio_only: bool,
}

/// Reply to `POST /api/download`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitReply {
    pub fn accepted(download_id: impl Into<String>) -> Self {
        Self {
            download_id: Some(download_id.into()),
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            download_id: None,
            error: Some(message.into()),
        }
    }
}

/// Job status as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Waiting,
    Downloading,
    Converting,
    Ready,
}

impl WireStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireStatus::Waiting => "waiting",
            WireStatus::Downloading => "downloading",
            WireStatus::Converting => "converting",
            WireStatus::Ready => "ready",
        }
    }
}

/// Reply to `GET /api/progress/{download_id}`
///
/// Every member is optional on the wire: error replies carry only `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WireStatus>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressReply {
    pub fn status(status: WireStatus, progress: f64) -> Self {
        Self {
            progress: Some(progress),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, speed: impl Into<String>, eta: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self.eta = Some(eta.into());
        self
    }

    pub fn ready(filename: impl Into<String>) -> Self {
        Self {
            progress: Some(100.0),
            status: Some(WireStatus::Ready),
            filename: Some(filename.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_request_field_names() {
        let body = serde_json::to_value(SubmitRequest {
            url: "https://youtu.be/abc".to_string(),
            audio_only: true,
        })
        .unwrap();

        assert_eq!(body, json!({"url": "https://youtu.be/abc", "audio_only": true}));
    }

    #[test]
    fn test_submit_reply_variants() {
        let ok: SubmitReply = serde_json::from_value(json!({"download_id": "123"})).unwrap();
        assert_eq!(ok, SubmitReply::accepted("123"));

        let rejected: SubmitReply = serde_json::from_value(json!({"error": "URL is required"})).unwrap();
        assert_eq!(rejected, SubmitReply::rejected("URL is required"));
    }

    #[test]
    fn test_progress_reply_full_body() {
        let reply: ProgressReply = serde_json::from_value(json!({
            "progress": 10,
            "speed": "1 MiB/s",
            "eta": "00:30",
            "status": "downloading",
            "filename": null
        }))
        .unwrap();

        assert_eq!(reply.progress, Some(10.0));
        assert_eq!(reply.status, Some(WireStatus::Downloading));
        assert_eq!(reply.speed.as_deref(), Some("1 MiB/s"));
        assert_eq!(reply.filename, None);
        assert_eq!(reply.error, None);
    }

    #[test]
    fn test_progress_reply_error_only() {
        let reply: ProgressReply = serde_json::from_value(json!({"error": "video unavailable"})).unwrap();

        assert_eq!(reply, ProgressReply::failed("video unavailable"));
        assert_eq!(reply.status, None);
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        let result = serde_json::from_value::<ProgressReply>(json!({"status": "paused"}));
        assert!(result.is_err());
    }
}
