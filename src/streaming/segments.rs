//! Artifact handlers with HTTP range support.

use std::io::SeekFrom;
use std::path::{Path as FsPath, PathBuf};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use streamforge_common::{Artifact, Error, OwnerId, VideoDir, VideoId};

use crate::server::{AppContext, AppError};

/// Serve the DASH manifest and count a view.
pub async fn manifest(
    State(ctx): State<AppContext>,
    Path((owner, video)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = scoped_dir(&ctx, &owner, &video)?;
    serve_manifest(&ctx, &dir, &headers).await
}

pub async fn manifest_by_video(
    State(ctx): State<AppContext>,
    Path(video): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = lookup_dir(&ctx, &video).await?;
    serve_manifest(&ctx, &dir, &headers).await
}

pub async fn thumbnail(
    State(ctx): State<AppContext>,
    Path((owner, video)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = scoped_dir(&ctx, &owner, &video)?;
    serve_artifact(&dir, &Artifact::Thumbnail, &headers).await
}

pub async fn thumbnail_by_video(
    State(ctx): State<AppContext>,
    Path(video): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = lookup_dir(&ctx, &video).await?;
    serve_artifact(&dir, &Artifact::Thumbnail, &headers).await
}

pub async fn audio_segment(
    State(ctx): State<AppContext>,
    Path((owner, video, p1, p2, segment)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = scoped_dir(&ctx, &owner, &video)?;
    serve_artifact(&dir, &Artifact::AudioSegment { p1, p2, segment }, &headers).await
}

pub async fn audio_segment_by_video(
    State(ctx): State<AppContext>,
    Path((video, p1, p2, segment)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = lookup_dir(&ctx, &video).await?;
    serve_artifact(&dir, &Artifact::AudioSegment { p1, p2, segment }, &headers).await
}

pub async fn video_segment(
    State(ctx): State<AppContext>,
    Path((owner, video, rendition, segment)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = scoped_dir(&ctx, &owner, &video)?;
    serve_artifact(&dir, &Artifact::VideoSegment { rendition, segment }, &headers).await
}

pub async fn video_segment_by_video(
    State(ctx): State<AppContext>,
    Path((video, rendition, segment)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let dir = lookup_dir(&ctx, &video).await?;
    serve_artifact(&dir, &Artifact::VideoSegment { rendition, segment }, &headers).await
}

fn parse_ids(owner: &str, video: &str) -> Result<(OwnerId, VideoId), AppError> {
    let owner = owner
        .parse::<OwnerId>()
        .map_err(|_| Error::path_rejected(format!("owner id {owner:?}")))?;
    let video = video
        .parse::<VideoId>()
        .map_err(|_| Error::path_rejected(format!("video id {video:?}")))?;
    Ok((owner, video))
}

fn scoped_dir(ctx: &AppContext, owner: &str, video: &str) -> Result<VideoDir, AppError> {
    let (owner, video) = parse_ids(owner, video)?;
    Ok(ctx.layout.resolve(owner, video))
}

async fn lookup_dir(ctx: &AppContext, video: &str) -> Result<VideoDir, AppError> {
    let video = video
        .parse::<VideoId>()
        .map_err(|_| Error::path_rejected(format!("video id {video:?}")))?;
    let owner = ctx
        .store
        .owner_of(video)
        .await?
        .ok_or_else(|| AppError::not_found(format!("video {video}")))?;
    Ok(ctx.layout.resolve(owner, video))
}

async fn serve_manifest(
    ctx: &AppContext,
    dir: &VideoDir,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let response = serve_artifact(dir, &Artifact::Manifest, headers).await?;

    match ctx.store.record_view(dir.video()).await {
        Ok(views) => tracing::trace!(video = %dir.video(), views, "Recorded view"),
        Err(e) if e.is_not_found() => {
            tracing::debug!(video = %dir.video(), "No record to count a view against")
        }
        Err(e) => tracing::warn!(video = %dir.video(), "Failed to record view: {}", e),
    }

    Ok(response)
}

/// Resolve `artifact` inside `dir` and stream it.
async fn serve_artifact(
    dir: &VideoDir,
    artifact: &Artifact,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let path = dir.artifact_path(artifact)?;
    let path = contained_file(dir.path(), &path)
        .await
        .ok_or_else(|| AppError::not_found(artifact.label()))?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::not_found(artifact.label()))?;
    let file_size = metadata.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| parse_range_header(s, file_size));

    let mut file = File::open(&path)
        .await
        .map_err(|_| AppError::not_found(artifact.label()))?;

    let cache_control = match artifact {
        Artifact::Manifest | Artifact::Thumbnail => "no-cache",
        _ => "max-age=3600",
    };

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, artifact.content_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, cache_control);

    let response = match range {
        Some((start, end)) => {
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start)).await.map_err(Error::from)?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                )
                .body(Body::from_stream(ReaderStream::new(file.take(length))))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, file_size.to_string())
            .body(Body::from_stream(ReaderStream::new(file))),
    };

    response.map_err(|e| AppError::from(Error::internal(format!("failed to build response: {e}"))))
}

/// `path` if it is a regular file that stays inside `dir` after resolving
/// symlinks.
async fn contained_file(dir: &FsPath, path: &FsPath) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(dir).await.ok()?;
    let resolved = tokio::fs::canonicalize(path).await.ok()?;
    if !resolved.starts_with(&root) {
        tracing::warn!(path = ?path, "Refusing to serve a file outside its video directory");
        return None;
    }
    resolved.is_file().then_some(resolved)
}

/// Parse HTTP Range header.
///
/// Supports formats:
/// - bytes=0-499
/// - bytes=500-
/// - bytes=-500 (last 500 bytes)
fn parse_range_header(header: &str, file_size: u64) -> Option<(u64, u64)> {
    let header = header.strip_prefix("bytes=")?;
    let (start, end) = header.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if file_size == 0 {
        return None;
    }

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            Some((file_size.saturating_sub(suffix_len), file_size - 1))
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            (start < file_size).then_some((start, file_size - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= file_size || start > end {
                return None;
            }
            Some((start, end.min(file_size - 1)))
        }
        (true, true) => None,
    }
}
