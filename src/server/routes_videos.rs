//! Upload, replace and delete routes.
//!
//! - `POST   /videos/upload/{owner}/{video}`: store a new source and run the pipeline
//! - `PUT    /videos/upload/{owner}/{video}`: replace the source and run it again
//! - `DELETE /videos/{owner}/{video}`: remove everything stored for the video

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use serde_json::json;
use streamforge_common::{Error, OwnerId, VideoDir, VideoId};

use super::{AppContext, AppError};
use crate::pipeline::ThumbnailStatus;

pub fn video_routes() -> Router<AppContext> {
    Router::new()
        .route("/upload/:owner/:video", post(create_video).put(replace_video))
        .route("/:id/:video", delete(delete_video))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadMode {
    Create,
    Replace,
}

async fn create_video(
    State(ctx): State<AppContext>,
    Path((owner, video)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    accept_upload(ctx, &owner, &video, multipart, UploadMode::Create).await
}

async fn replace_video(
    State(ctx): State<AppContext>,
    Path((owner, video)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    accept_upload(ctx, &owner, &video, multipart, UploadMode::Replace).await
}

fn parse_ids(owner: &str, video: &str) -> Result<(OwnerId, VideoId), AppError> {
    let owner = owner
        .parse::<OwnerId>()
        .map_err(|e| Error::invalid_input(e.to_string()))?;
    let video = video
        .parse::<VideoId>()
        .map_err(|e| Error::invalid_input(e.to_string()))?;
    Ok((owner, video))
}

async fn accept_upload(
    ctx: AppContext,
    owner: &str,
    video: &str,
    multipart: Multipart,
    mode: UploadMode,
) -> Result<Response, AppError> {
    let (owner, video) = parse_ids(owner, video)?;

    // Held until the pipeline run ends; a second upload answers 409 meanwhile.
    let guard = ctx.runner.claim(owner, video)?;

    if let Some(existing) = ctx.store.owner_of(video).await? {
        if existing != owner {
            return Err(Error::conflict(format!("video {video} belongs to another owner")).into());
        }
    }

    let dir = ctx.layout.resolve(owner, video);
    let had_source = dir.find_source().is_some();
    match (mode, had_source) {
        (UploadMode::Create, true) => {
            return Err(Error::conflict(format!("video {owner}/{video} already exists")).into())
        }
        (UploadMode::Replace, false) => {
            return Err(AppError::not_found(format!("video {owner}/{video}")))
        }
        _ => {}
    }

    ctx.layout.ensure(&dir)?;
    let upload = match ctx.uploads.assemble(multipart, &dir).await {
        Ok(upload) => upload,
        Err(e) => {
            if mode == UploadMode::Create {
                discard_new_dir(&ctx, &dir);
            }
            return Err(e.into());
        }
    };

    // Another owner may have registered this video id since the check above.
    if let Err(e) = ctx.store.register(owner, video, upload.details.clone()).await {
        if mode == UploadMode::Create {
            discard_new_dir(&ctx, &dir);
        }
        return Err(e.into());
    }
    tracing::info!(
        owner = %owner,
        video = %video,
        bytes = upload.bytes,
        replace = mode == UploadMode::Replace,
        "Upload accepted"
    );

    let location = format!("/videos/{owner}/{video}/manifest.mpd");

    if ctx.config.pipeline.background {
        let _handle = ctx.runner.spawn(guard, upload.path);
        let body = json!({
            "owner": owner,
            "video": video,
            "status": "processing",
            "manifest": location,
        });
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let report = ctx.runner.run(guard, upload.path).await?;
    let body = json!({
        "owner": owner,
        "video": video,
        "status": "ready",
        "manifest": location,
        "thumbnail": matches!(report.thumbnail, ThumbnailStatus::Extracted(_)),
        "elapsed_ms": report.elapsed.as_millis() as u64,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

fn discard_new_dir(ctx: &AppContext, dir: &VideoDir) {
    if let Err(e) = ctx.layout.remove(dir) {
        tracing::warn!(path = ?dir.path(), "Failed to remove directory of rejected upload: {}", e);
    }
}

async fn delete_video(
    State(ctx): State<AppContext>,
    Path((owner, video)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let (owner, video) = parse_ids(owner.as_str(), video.as_str())?;
    let _guard = ctx.runner.claim(owner, video)?;

    let dir = ctx.layout.resolve(owner, video);
    let removed = ctx.layout.remove(&dir)?;

    if ctx.store.owner_of(video).await? == Some(owner) {
        ctx.store.forget(video).await?;
    }

    tracing::info!(owner = %owner, video = %video, removed, "Video deleted");
    Ok(StatusCode::NO_CONTENT)
}
