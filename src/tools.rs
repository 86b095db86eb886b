//! Availability check for the configured external tools.

use streamforge_av::{check_tool, ToolInfo};

use crate::config::Config;

/// One configured tool and what was found for it.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    /// Pipeline role: `fragmenter`, `packager` or `thumbnailer`.
    pub role: &'static str,
    pub info: ToolInfo,
}

/// Check the fragmenter, packager and thumbnailer.
pub async fn check_tools(config: &Config) -> Vec<ToolStatus> {
    let tools = &config.tools;
    let checks = [
        ("fragmenter", &tools.fragmenter.path, version_args(&tools.fragmenter.path)),
        ("packager", &tools.packager.path, version_args(&tools.packager.path)),
        ("thumbnailer", &tools.thumbnailer.path, version_args(&tools.thumbnailer.path)),
    ];

    let mut statuses = Vec::with_capacity(checks.len());
    for (role, path, args) in checks {
        let info = check_tool(path, args).await;
        statuses.push(ToolStatus { role, info });
    }
    statuses
}

/// ffmpeg only understands the single-dash form.
fn version_args(path: &std::path::Path) -> &'static [&'static str] {
    let is_ffmpeg = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with("ffmpeg"));
    if is_ffmpeg {
        &["-version"]
    } else {
        &["--version"]
    }
}
