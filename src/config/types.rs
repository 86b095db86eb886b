use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use streamforge_av::{BitrateLadder, FragmenterTool, PackagerTool, ThumbnailerTool};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub ladder: BitrateLadder,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_upload_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root of the `{owner}/{video}` tree.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Lowercase extensions accepted for uploaded sources.
    #[serde(default = "default_permitted_extensions")]
    pub permitted_extensions: Vec<String>,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./videos")
}
fn default_permitted_extensions() -> Vec<String> {
    vec!["mp4".to_string()]
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            permitted_extensions: default_permitted_extensions(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub fragmenter: FragmenterTool,

    #[serde(default)]
    pub packager: PackagerTool,

    #[serde(default)]
    pub thumbnailer: ThumbnailerTool,
}

/// Per-stage deadlines in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_fragment_secs")]
    pub fragment_secs: u64,

    #[serde(default = "default_package_secs")]
    pub package_secs: u64,

    #[serde(default = "default_thumbnail_secs")]
    pub thumbnail_secs: u64,
}

fn default_fragment_secs() -> u64 {
    3600
}
fn default_package_secs() -> u64 {
    900
}
fn default_thumbnail_secs() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            fragment_secs: default_fragment_secs(),
            package_secs: default_package_secs(),
            thumbnail_secs: default_thumbnail_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn fragment(&self) -> Duration {
        Duration::from_secs(self.fragment_secs)
    }

    pub fn package(&self) -> Duration {
        Duration::from_secs(self.package_secs)
    }

    pub fn thumbnail(&self) -> Duration {
        Duration::from_secs(self.thumbnail_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Upper bound on pipeline runs executing at the same time.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Run the pipeline off the request task and answer 202 right away.
    #[serde(default)]
    pub background: bool,

    /// Remove the video directory when fragmenting or packaging fails.
    #[serde(default = "default_cleanup_on_failure")]
    pub cleanup_on_failure: bool,
}

fn default_max_concurrent_runs() -> usize {
    2
}
fn default_cleanup_on_failure() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
            background: false,
            cleanup_on_failure: default_cleanup_on_failure(),
        }
    }
}
