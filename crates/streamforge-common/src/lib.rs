//! Streamforge-Common: shared types and the storage layout.
//!
//! This crate provides common functionality used across streamforge:
//!
//! - **Typed IDs**: [`OwnerId`] and [`VideoId`] wrappers so an owner can never be
//!   passed where a video is expected
//! - **Storage Layout**: [`StorageLayout`] maps `(owner, video)` to a directory and
//!   builds every artifact path served to players
//! - **Path Utilities**: source-extension checks used by the upload step
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use streamforge_common::{Artifact, OwnerId, StorageLayout, VideoId};
//!
//! let layout = StorageLayout::new("/srv/videos");
//! let dir = layout.resolve(OwnerId::new(7), VideoId::new(42));
//! let manifest = dir.artifact_path(&Artifact::Manifest).unwrap();
//! assert!(manifest.ends_with("7/42/stream.mpd"));
//! ```

pub mod error;
pub mod ids;
pub mod layout;
pub mod paths;

pub use error::{Error, Result};
pub use ids::{OwnerId, VideoId};
pub use layout::{Artifact, StorageLayout, VideoDir, MANIFEST_FILE, THUMBNAIL_FILE};
