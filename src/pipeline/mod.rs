//! The segmentation pipeline.
//!
//! One run turns a stored source into a DASH rendition set inside its video
//! directory: Fragment, then Package, then Thumbnail, strictly in that order.
//! [`executor`] holds the stage sequence; [`runner`] decides when a run may
//! start and what happens to the directory when it fails.

pub mod executor;
pub mod runner;

pub use executor::{SegmentationPipeline, StateCallback};
pub use runner::{PipelineRunner, RunGuard};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use streamforge_av::ToolError;

/// One ordered unit of work, backed by one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fragment,
    Package,
    Thumbnail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fragment => "fragment",
            Stage::Package => "package",
            Stage::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// Observable state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Fragmenting,
    Packaging,
    ThumbnailExtraction,
    Complete,
    Failed,
}

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureCause {
    /// The tool binary could not be started.
    #[error("could not start {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} exited with {}: {}", exit_label(exit_code), stderr.trim())]
    Execution {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The tool exceeded its deadline and was killed.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// The tool reported success but expected files are absent.
    #[error("expected output missing: {}", missing.join(", "))]
    PartialOutput { missing: Vec<String> },

    /// Filesystem or process I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

fn exit_label(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "a signal".to_string(), |c| c.to_string())
}

impl From<streamforge_av::Error> for FailureCause {
    fn from(err: streamforge_av::Error) -> Self {
        use streamforge_av::Error as AvError;

        match err {
            AvError::Tool(ToolError::Spawn { tool, source }) => FailureCause::Spawn {
                tool,
                message: source.to_string(),
            },
            AvError::Tool(ToolError::Execution {
                tool,
                exit_code,
                stderr,
                ..
            }) => FailureCause::Execution {
                tool,
                exit_code,
                stderr,
            },
            AvError::Tool(ToolError::Timeout { tool, after }) => {
                FailureCause::Timeout { tool, after }
            }
            AvError::Tool(ToolError::Io { tool, source }) => {
                FailureCause::Io(format!("{tool}: {source}"))
            }
            AvError::ToolNotFound { tool } => FailureCause::Spawn {
                tool,
                message: "not found".into(),
            },
            AvError::PartialOutput { missing } => FailureCause::PartialOutput { missing },
            AvError::Workspace(msg) | AvError::InvalidInput(msg) => FailureCause::Io(msg),
            AvError::Io(e) => FailureCause::Io(e.to_string()),
        }
    }
}

impl From<std::io::Error> for FailureCause {
    fn from(err: std::io::Error) -> Self {
        FailureCause::Io(err.to_string())
    }
}

/// A fatal pipeline failure: the stage that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    pub cause: FailureCause,
}

impl PipelineError {
    pub fn new(stage: Stage, cause: impl Into<FailureCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Whether the failure was a timeout rather than a bad exit.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FailureCause::Timeout { .. })
    }
}

/// Outcome of the thumbnail stage. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailStatus {
    Extracted(PathBuf),
    SoftFailure(String),
}

impl ThumbnailStatus {
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, ThumbnailStatus::SoftFailure(_))
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Published `stream.mpd`.
    pub manifest: PathBuf,
    /// Number of distinct files the manifest was verified to reference.
    pub verified_references: usize,
    pub thumbnail: ThumbnailStatus,
    pub elapsed: Duration,
}
