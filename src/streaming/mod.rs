//! Segment serving.
//!
//! Answers "does this artifact exist, and if so stream it" for the DASH
//! manifest, audio segments, video segments and the thumbnail.
//!
//! # Routes
//!
//! Owner-scoped:
//! - `GET /videos/{owner}/{video}/manifest.mpd`
//! - `GET /videos/{owner}/{video}/audio/{p1}/{p2}/{segment}`
//! - `GET /videos/{owner}/{video}/video/{rendition}/{segment}`
//! - `GET /videos/{owner}/{video}/thumbnail.jpg`
//!
//! Video-id only (owner looked up through the video store):
//! - `GET /videos/{video}/manifest.mpd`
//! - `GET /videos/{video}/audio/{p1}/{p2}/{segment}`
//! - `GET /videos/{video}/video/{rendition}/{segment}`
//! - `GET /videos/{video}/thumbnail.jpg`

mod segments;

pub use segments::{
    audio_segment, audio_segment_by_video, manifest, manifest_by_video, thumbnail,
    thumbnail_by_video, video_segment, video_segment_by_video,
};

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create the segment router, nested under `/videos`.
///
/// Every route names its second-level parameter `id` so the owner-scoped and
/// video-only trees share one parameter node.
pub fn segment_router() -> Router<AppContext> {
    Router::new()
        .route("/:id/manifest.mpd", get(manifest_by_video))
        .route("/:id/thumbnail.jpg", get(thumbnail_by_video))
        .route("/:id/audio/:p1/:p2/:segment", get(audio_segment_by_video))
        .route("/:id/video/:rendition/:segment", get(video_segment_by_video))
        .route("/:id/:video/manifest.mpd", get(manifest))
        .route("/:id/:video/thumbnail.jpg", get(thumbnail))
        .route("/:id/:video/audio/:p1/:p2/:segment", get(audio_segment))
        .route("/:id/:video/video/:rendition/:segment", get(video_segment))
}
