use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use clipfetch::stub::{self, StubState};
use clipfetch::wire::{ProgressReply, SubmitReply, WireStatus};

fn build_test_app() -> (Router, StubState) {
    let state = StubState::default();
    (stub::router(state.clone()), state)
}

fn post_download(body: Value) -> Request<Body> {
    Request::builder()
        .uri("/api/download")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn submit(app: &Router, url: &str, audio_only: bool) -> String {
    let response = app
        .clone()
        .oneshot(post_download(json!({"url": url, "audio_only": audio_only})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reply: SubmitReply = read_json(response).await;
    reply.download_id.expect("accepted submission carries an id")
}

async fn poll(app: &Router, download_id: &str) -> ProgressReply {
    let response = app
        .clone()
        .oneshot(get(&format!("/api/progress/{}", download_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn test_submit_accepts_url() {
    let (app, state) = build_test_app();

    let download_id = submit(&app, "https://youtu.be/abc", false).await;

    assert!(!download_id.is_empty());
    let jobs = state.jobs.read().await;
    let job = jobs.get(&download_id).unwrap();
    assert_eq!(job.url, "https://youtu.be/abc");
    assert_eq!(job.filename, format!("{}.mp4", download_id));
}

#[tokio::test]
async fn test_submit_without_url_is_rejected() {
    let (app, state) = build_test_app();

    for body in [json!({}), json!({"url": ""}), json!({"audio_only": true})] {
        let response = app.clone().oneshot(post_download(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let reply: SubmitReply = read_json(response).await;
        assert_eq!(reply, SubmitReply::rejected("URL is required"));
    }
    assert!(state.jobs.read().await.is_empty());
}

#[tokio::test]
async fn test_progress_walks_script_to_ready() {
    let (app, state) = build_test_app();
    let download_id = submit(&app, "https://youtu.be/abc", true).await;

    let first = poll(&app, &download_id).await;
    assert_eq!(first.status, Some(WireStatus::Waiting));
    assert_eq!(first.progress, Some(0.0));

    let steps = state.script.steps.len();
    let mut last = first;
    for _ in 1..=steps {
        last = poll(&app, &download_id).await;
        assert_eq!(last.error, None);
    }

    assert_eq!(last.status, Some(WireStatus::Ready));
    assert_eq!(last.filename, Some(format!("{}.mp3", download_id)));
}

#[tokio::test]
async fn test_progress_reports_failure_marker() {
    let (app, _state) = build_test_app();
    let download_id = submit(&app, "https://youtu.be/unavailable", false).await;

    let first = poll(&app, &download_id).await;
    assert_eq!(first.error, None);

    let second = poll(&app, &download_id).await;
    assert_eq!(second, ProgressReply::failed("video unavailable"));
}

#[tokio::test]
async fn test_progress_unknown_id() {
    let (app, _state) = build_test_app();

    let response = app.oneshot(get("/api/progress/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = read_json(response).await;
    assert_eq!(body, json!({"error": "Invalid download ID"}));
}

#[tokio::test]
async fn test_download_only_after_ready() {
    let (app, state) = build_test_app();
    let download_id = submit(&app, "https://youtu.be/abc", false).await;
    let filename = format!("{}.mp4", download_id);
    let uri = format!("/api/download/{}", filename);

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for _ in 0..=state.script.steps.len() {
        poll(&app, &download_id).await;
    }

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}\"", filename).as_str()
    );
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let (app, _state) = build_test_app();

    let response = app.oneshot(get("/api/download/..%2Fsecret")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = read_json(response).await;
    assert_eq!(body, json!({"error": "Invalid filename"}));
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = build_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
