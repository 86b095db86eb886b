//! Storage layout for uploaded sources and their DASH renditions.
//!
//! Every video lives in its own directory keyed by owner and video id:
//!
//! ```text
//! {base}/{owner}/{video}/video.<ext>                      source
//! {base}/{owner}/{video}/stream.mpd                       DASH manifest
//! {base}/{owner}/{video}/video/{rendition}/{segment}      video segments
//! {base}/{owner}/{video}/audio/{p1}/{p2}/{segment}        audio segments
//! {base}/{owner}/{video}/thumbnail.jpg                    thumbnail
//! ```
//!
//! Paths below the video directory are only ever built through
//! [`VideoDir::artifact_path`], which refuses any component that is not a
//! single plain file name.

use crate::{Error, OwnerId, Result, VideoId};
use std::path::{Component, Path, PathBuf};

/// File name of the DASH manifest.
pub const MANIFEST_FILE: &str = "stream.mpd";

/// File name of the extracted thumbnail.
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// File stem of the stored source.
pub const SOURCE_STEM: &str = "video";

/// Directory holding audio segment trees.
pub const AUDIO_DIR: &str = "audio";

/// Directory holding video segment trees.
pub const VIDEO_DIR: &str = "video";

/// Maps `(owner, video)` pairs to directories under a base path.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    base: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `base`. The directory need not exist.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Root directory of the layout.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Compute the directory for one video. Pure; touches no filesystem.
    pub fn resolve(&self, owner: OwnerId, video: VideoId) -> VideoDir {
        let path = self
            .base
            .join(owner.to_string())
            .join(video.to_string());
        VideoDir { owner, video, path }
    }

    /// Create the video directory and its parents if absent.
    pub fn ensure(&self, dir: &VideoDir) -> Result<()> {
        std::fs::create_dir_all(&dir.path)?;
        Ok(())
    }

    /// Recursively delete the video directory.
    ///
    /// Returns `false` if there was nothing to delete.
    pub fn remove(&self, dir: &VideoDir) -> Result<bool> {
        match std::fs::remove_dir_all(&dir.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// The directory owned by one `(owner, video)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDir {
    owner: OwnerId,
    video: VideoId,
    path: PathBuf,
}

impl VideoDir {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn video(&self) -> VideoId {
        self.video
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Build the on-disk path of an artifact inside this directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathRejected`] if any caller-supplied component is not a
    /// single plain file name.
    pub fn artifact_path(&self, artifact: &Artifact) -> Result<PathBuf> {
        let mut path = self.path.clone();
        for component in artifact.components()? {
            path.push(component);
        }
        Ok(path)
    }

    /// Convenience for the manifest path, which never needs validation.
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Convenience for the thumbnail path.
    pub fn thumbnail_path(&self) -> PathBuf {
        self.path.join(THUMBNAIL_FILE)
    }

    /// Locate a stored `video.<ext>` source, if any.
    pub fn find_source(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.path).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file()
                    && path.file_stem().and_then(|s| s.to_str()) == Some(SOURCE_STEM)
            })
    }
}

/// One servable or stored file inside a video directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// `stream.mpd`
    Manifest,
    /// `thumbnail.jpg`
    Thumbnail,
    /// `video.<extension>`
    Source { extension: String },
    /// `audio/{p1}/{p2}/{segment}`
    AudioSegment {
        p1: String,
        p2: String,
        segment: String,
    },
    /// `video/{rendition}/{segment}`
    VideoSegment { rendition: String, segment: String },
}

impl Artifact {
    /// Content type served for this artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            Artifact::Manifest => "application/xml",
            Artifact::Thumbnail => "image/jpg",
            Artifact::Source { .. } | Artifact::VideoSegment { .. } => "video/mp4",
            Artifact::AudioSegment { .. } => "audio/aac",
        }
    }

    /// Short name used in logs and not-found messages.
    pub fn label(&self) -> &'static str {
        match self {
            Artifact::Manifest => "manifest",
            Artifact::Thumbnail => "thumbnail",
            Artifact::Source { .. } => "source",
            Artifact::AudioSegment { .. } => "audio segment",
            Artifact::VideoSegment { .. } => "video segment",
        }
    }

    fn components(&self) -> Result<Vec<String>> {
        Ok(match self {
            Artifact::Manifest => vec![MANIFEST_FILE.to_string()],
            Artifact::Thumbnail => vec![THUMBNAIL_FILE.to_string()],
            Artifact::Source { extension } => {
                let ext = validate_component(extension)?;
                if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(Error::path_rejected(format!("source extension {ext:?}")));
                }
                vec![format!("{SOURCE_STEM}.{ext}")]
            }
            Artifact::AudioSegment { p1, p2, segment } => vec![
                AUDIO_DIR.to_string(),
                validate_component(p1)?.to_string(),
                validate_component(p2)?.to_string(),
                validate_component(segment)?.to_string(),
            ],
            Artifact::VideoSegment { rendition, segment } => vec![
                VIDEO_DIR.to_string(),
                validate_component(rendition)?.to_string(),
                validate_component(segment)?.to_string(),
            ],
        })
    }
}

/// Accept `part` only if it is exactly one normal path component.
///
/// Rejects empty strings, `.` and `..`, anything containing a separator
/// (either slash), NUL, and absolute paths.
pub fn validate_component(part: &str) -> Result<&str> {
    let reject = || Err(Error::path_rejected(format!("path component {part:?}")));

    if part.is_empty() || part.contains(['/', '\\', '\0']) {
        return reject();
    }

    let mut components = Path::new(part).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == part => Ok(part),
        _ => reject(),
    }
}
