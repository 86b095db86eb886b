//! Upload, replace and rejection paths of the upload routes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;

use common::{body_to_json, send_form, Multipart, TestHarness};
use streamforge::server::{create_router, AppContext};
use streamforge::store::{VideoDetails, VideoRecord, VideoStatus, VideoStore};
use streamforge_common::{Error, OwnerId, Result, VideoId};

/// Store that loses every registration race: the owner lookup sees nothing,
/// then registration finds the id taken.
struct ClaimedElsewhere;

#[async_trait]
impl VideoStore for ClaimedElsewhere {
    async fn owner_of(&self, _video: VideoId) -> Result<Option<OwnerId>> {
        Ok(None)
    }

    async fn register(&self, _owner: OwnerId, video: VideoId, _: VideoDetails) -> Result<()> {
        Err(Error::conflict(format!("video {video} belongs to another owner")))
    }

    async fn record_view(&self, video: VideoId) -> Result<u64> {
        Err(Error::not_found(format!("video {video}")))
    }

    async fn set_status(&self, _video: VideoId, _status: VideoStatus) -> Result<()> {
        Ok(())
    }

    async fn forget(&self, _video: VideoId) -> Result<bool> {
        Ok(false)
    }

    async fn get(&self, _video: VideoId) -> Result<Option<VideoRecord>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_upload_stores_source_as_video_ext() {
    let harness = TestHarness::new();

    let response = harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let source = harness.video_dir(7, 42).join("video.mp4");
    assert_eq!(std::fs::read(&source).unwrap(), b"fake mp4 payload");
    let stray: Vec<_> = std::fs::read_dir(harness.video_dir(7, 42))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".upload-"))
        .collect();
    assert!(stray.is_empty());
}

#[tokio::test]
async fn test_second_post_conflicts() {
    let harness = TestHarness::new();
    harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;

    let response = harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("again"))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "conflict");

    // The first upload is untouched.
    assert!(harness.video_dir(7, 42).join("stream.mpd").is_file());
}

#[tokio::test]
async fn test_post_during_run_conflicts() {
    let harness = TestHarness::new();
    let _guard = harness
        .ctx
        .runner
        .claim(OwnerId::new(7), VideoId::new(42))
        .unwrap();

    let response = harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(!harness.video_dir(7, 42).exists());
}

#[tokio::test]
async fn test_video_id_owned_by_someone_else_conflicts() {
    let harness = TestHarness::new();
    harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;

    let response = harness
        .upload("POST", "/videos/upload/8/42", Multipart::video("mine"))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(!harness.video_dir(8, 42).exists());
}

#[tokio::test]
async fn test_lost_registration_race_discards_new_directory() {
    let harness = TestHarness::new();
    let ctx = AppContext::new(harness.config.clone(), Arc::new(ClaimedElsewhere));

    let response = send_form(
        create_router(ctx),
        "POST",
        "/videos/upload/8/42",
        Multipart::video("mine"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert!(!harness.video_dir(8, 42).exists());
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_put_replaces_source_and_reruns() {
    let harness = TestHarness::new();
    harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("first"))
        .await;

    let form = Multipart::new()
        .text("title", "second")
        .file("file", "take2.mp4", b"replacement payload");
    let response = harness.upload("PUT", "/videos/upload/7/42", form).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let dir = harness.video_dir(7, 42);
    assert_eq!(
        std::fs::read(dir.join("video.mp4")).unwrap(),
        b"replacement payload"
    );
    assert!(dir.join("stream.mpd").is_file());
    assert_eq!(
        harness.calls().iter().filter(|c| *c == "package").count(),
        2
    );

    let record = harness.store.get(VideoId::new(42)).await.unwrap().unwrap();
    assert_eq!(record.details.title.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_put_without_source_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .upload("PUT", "/videos/upload/7/42", Multipart::video("clip"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_rejected_extension() {
    let harness = TestHarness::new();

    let form = Multipart::new().file("file", "clip.avi", b"data");
    let response = harness.upload("POST", "/videos/upload/7/42", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "validation_error");

    assert!(!harness.video_dir(7, 42).exists());
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_two_files_in_one_request() {
    let harness = TestHarness::new();

    let form = Multipart::new()
        .file("file", "a.mp4", b"one")
        .file("file", "b.mp4", b"two");
    let response = harness.upload("POST", "/videos/upload/7/42", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!harness.video_dir(7, 42).exists());
}

#[tokio::test]
async fn test_request_without_file() {
    let harness = TestHarness::new();

    let form = Multipart::new().text("title", "nothing attached");
    let response = harness.upload("POST", "/videos/upload/7/42", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_invalid_ids_are_bad_requests() {
    let harness = TestHarness::new();

    for uri in ["/videos/upload/seven/42", "/videos/upload/7/-1"] {
        let response = harness.upload("POST", uri, Multipart::video("clip")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_upload_size_limit() {
    let harness = TestHarness::with_tools_and(Default::default(), |config| {
        config.server.max_upload_bytes = 4;
    });

    let response = harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!harness.video_dir(7, 42).exists());
}

#[tokio::test]
async fn test_background_upload_accepts_then_completes() {
    let harness = TestHarness::with_tools_and(Default::default(), |config| {
        config.pipeline.background = true;
    });

    let response = harness
        .upload("POST", "/videos/upload/7/42", Multipart::video("clip"))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "processing");

    let video = VideoId::new(42);
    let mut status = None;
    for _ in 0..100 {
        status = harness.store.get(video).await.unwrap().map(|r| r.status);
        if status == Some(VideoStatus::Ready) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status, Some(VideoStatus::Ready));
    assert!(harness.video_dir(7, 42).join("stream.mpd").is_file());
}
