use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    error::StubError,
    state::{StubJob, StubState},
};
use crate::wire::{ProgressReply, SubmitReply, WireStatus};

/// Submit body as the real service reads it: both members optional
#[derive(Debug, Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
}

/// Start a job (POST /api/download)
pub async fn start_download(
    State(state): State<StubState>,
    Json(body): Json<StartBody>,
) -> Result<Json<SubmitReply>, StubError> {
    let url = body
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| StubError::BadRequest("URL is required".to_string()))?;

    let download_id = Uuid::now_v7().simple().to_string();
    let extension = if body.audio_only { "mp3" } else { "mp4" };
    let job = StubJob {
        url,
        audio_only: body.audio_only,
        polls: 0,
        filename: format!("{}.{}", download_id, extension),
    };

    info!(%download_id, url = %job.url, audio_only = job.audio_only, "Stub job accepted");
    state.jobs.write().await.insert(download_id.clone(), job);

    Ok(Json(SubmitReply::accepted(download_id)))
}

/// Report job progress (GET /api/progress/{download_id})
///
/// Every request advances the job one step through the script.
pub async fn get_progress(
    State(state): State<StubState>,
    Path(download_id): Path<String>,
) -> Result<Json<ProgressReply>, StubError> {
    let mut jobs = state.jobs.write().await;
    let job = jobs
        .get_mut(&download_id)
        .ok_or_else(|| StubError::NotFound("Invalid download ID".to_string()))?;

    let reply = state.script.reply_for(job, job.polls);
    job.polls += 1;

    debug!(
        %download_id,
        poll = job.polls,
        status = reply.status.map(|s| s.as_str()),
        "Stub progress served"
    );
    Ok(Json(reply))
}

/// Hand out a finished artifact (GET /api/download/{filename})
pub async fn download_file(
    State(state): State<StubState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, StubError> {
    if filename.contains("..") || filename.starts_with('/') {
        return Err(StubError::BadRequest("Invalid filename".to_string()));
    }

    let jobs = state.jobs.read().await;
    let job = jobs
        .values()
        .find(|job| job.filename == filename && is_ready(&state, job))
        .ok_or_else(|| StubError::NotFound("File not found".to_string()))?;

    let content_type = if job.audio_only { "audio/mpeg" } else { "video/mp4" };
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let body = format!("clipfetch stub artifact for {}\n", job.url);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

fn is_ready(state: &StubState, job: &StubJob) -> bool {
    let last = job.polls.saturating_sub(1);
    job.polls > 0 && state.script.reply_for(job, last).status == Some(WireStatus::Ready)
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}
