//! Source file extension checks.
//!
//! The upload step keeps the client's extension (lowercased) for the stored
//! `video.<ext>` file, so the extension must be a known video container and
//! must itself be a safe single path component.

use std::path::Path;

/// Video container extensions streamforge knows how to fragment.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm"];

/// Check if a path has a known video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use streamforge_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.mp4")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    source_extension(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lowercased extension of `path`, if it has a plain alphanumeric one.
pub fn source_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Returns the extension of `file_name` if it is in `permitted`.
///
/// Comparison is case-insensitive; `permitted` entries may carry a leading dot.
pub fn permitted_extension(file_name: &str, permitted: &[String]) -> Option<String> {
    let ext = source_extension(Path::new(file_name))?;
    permitted
        .iter()
        .any(|p| p.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        .then_some(ext)
}
