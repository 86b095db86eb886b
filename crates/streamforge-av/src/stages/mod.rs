//! The three segmentation stages and their tool configuration.
//!
//! Each stage expands its argument templates with a [`TemplateContext`],
//! runs exactly one [`ToolCommand`] and then checks the files the tool was
//! supposed to produce. A zero exit status alone is never taken as success.
//!
//! [`TemplateContext`]: crate::TemplateContext
//! [`ToolCommand`]: crate::ToolCommand

mod fragment;
mod package;
mod thumbnail;

pub use fragment::{fragment, FragmentOutputs};
pub use package::package;
pub use thumbnail::extract_thumbnail;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fragmenter invocation: one run writes a fragmented MP4 per rendition plus
/// one audio-only fragmented MP4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmenterTool {
    pub path: PathBuf,
    /// Arguments placed once before all outputs.
    pub input_args: Vec<String>,
    /// Arguments repeated for every rendition (`{name}`, `{width}`,
    /// `{height}`, `{bitrate}`, `{output}`).
    pub rendition_args: Vec<String>,
    /// Arguments for the audio output. Empty disables the audio output.
    pub audio_args: Vec<String>,
}

impl Default for FragmenterTool {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ffmpeg"),
            input_args: args(&["-hide_banner", "-nostdin", "-y", "-i", "{input}"]),
            rendition_args: args(&[
                "-map",
                "0:v:0",
                "-an",
                "-vf",
                "scale={width}:{height}",
                "-c:v",
                "libx264",
                "-b:v",
                "{bitrate}k",
                "-g",
                "96",
                "-keyint_min",
                "96",
                "-sc_threshold",
                "0",
                "-movflags",
                "frag_keyframe+empty_moov+default_base_moof",
                "{output}",
            ]),
            audio_args: args(&[
                "-map",
                "0:a:0",
                "-vn",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-movflags",
                "frag_keyframe+empty_moov+default_base_moof",
                "{output}",
            ]),
        }
    }
}

/// DASH packager invocation (Bento4 `mp4dash` by default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagerTool {
    pub path: PathBuf,
    /// `{output_dir}` is the staging directory, `{inputs}` the fragmented files.
    pub args: Vec<String>,
}

impl Default for PackagerTool {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mp4dash"),
            args: args(&[
                "--force",
                "--mpd-name=stream.mpd",
                "--output-dir={output_dir}",
                "{inputs}",
            ]),
        }
    }
}

/// Single-frame thumbnail extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailerTool {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Seek position of the extracted frame, substituted as `{offset}`.
    pub offset: String,
}

impl Default for ThumbnailerTool {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ffmpeg"),
            args: args(&[
                "-hide_banner",
                "-nostdin",
                "-y",
                "-ss",
                "{offset}",
                "-i",
                "{input}",
                "-frames:v",
                "1",
                "{output}",
            ]),
            offset: "00:00:00.000".to_string(),
        }
    }
}
