//! # streamforge-av
//!
//! External tool invocation and the DASH segmentation stages used by the
//! streamforge pipeline.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder that runs one
//!   external process with a deadline, captures its output and kills the whole
//!   process group on timeout.
//! - **Tool discovery** ([`tools`]) -- resolve configured binaries via `PATH`
//!   and report their versions.
//! - **Argument templates** ([`TemplateContext`]) -- `{var}` substitution into
//!   argument vectors; no shell is ever involved.
//! - **Bitrate ladder** ([`BitrateLadder`]) -- the fixed, versioned rendition list.
//! - **Workspaces** ([`Workspace`]) -- per-run scratch directory inside the target
//!   directory with manifest-last publishing.
//! - **Manifest verification** ([`manifest`]) -- checks that every file a
//!   `stream.mpd` references exists.
//! - **Stages** ([`stages`]) -- fragment, package and thumbnail invocations.

mod error;
pub mod command;
pub mod ladder;
pub mod manifest;
pub mod stages;
pub mod template;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result, ToolError};
pub use ladder::{BitrateLadder, Rendition, LADDER_VERSION};
pub use manifest::ManifestCheck;
pub use stages::{FragmentOutputs, FragmenterTool, PackagerTool, ThumbnailerTool};
pub use template::TemplateContext;
pub use tools::{check_tool, require_tool, resolve_program, ToolInfo};
pub use workspace::Workspace;
