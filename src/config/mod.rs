mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./streamforge.toml",
        "./config.toml",
        "~/.config/streamforge/config.toml",
        "/etc/streamforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    let tools = &mut config.tools;
    for path in [
        &mut config.storage.base_path,
        &mut tools.fragmenter.path,
        &mut tools.packager.path,
        &mut tools.thumbnailer.path,
    ] {
        let expanded = expand_tilde(path);
        *path = expanded;
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&*raw).into_owned())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes cannot be 0");
    }

    if config.storage.permitted_extensions.is_empty() {
        anyhow::bail!("storage.permitted_extensions cannot be empty");
    }
    for ext in &config.storage.permitted_extensions {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            anyhow::bail!("Invalid permitted extension: {:?}", ext);
        }
    }

    config
        .ladder
        .validate()
        .context("Invalid bitrate ladder")?;

    let timeouts = &config.timeouts;
    if timeouts.fragment_secs == 0 || timeouts.package_secs == 0 || timeouts.thumbnail_secs == 0 {
        anyhow::bail!("Stage timeouts must be greater than 0");
    }

    if config.pipeline.max_concurrent_runs == 0 {
        anyhow::bail!("pipeline.max_concurrent_runs cannot be 0");
    }

    for (name, path) in [
        ("fragmenter", &config.tools.fragmenter.path),
        ("packager", &config.tools.packager.path),
        ("thumbnailer", &config.tools.thumbnailer.path),
    ] {
        if path.as_os_str().is_empty() {
            anyhow::bail!("tools.{}.path cannot be empty", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamforge_av::Rendition;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.server.max_upload_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.storage.permitted_extensions, vec!["mp4"]);
        assert_eq!(config.ladder.len(), 5);
        assert!(config.pipeline.cleanup_on_failure);
    }

    #[test]
    fn tilde_expanded_in_storage_and_tool_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamforge.toml");
        std::fs::write(
            &path,
            r#"
[storage]
base_path = "~/videos"

[tools.fragmenter]
path = "~/bin/ffmpeg"

[tools.packager]
path = "~/bin/mp4dash"

[tools.thumbnailer]
path = "ffmpeg"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let expect = |p: &str| PathBuf::from(shellexpand::tilde(p).into_owned());
        assert_eq!(config.storage.base_path, expect("~/videos"));
        assert_eq!(config.tools.fragmenter.path, expect("~/bin/ffmpeg"));
        assert_eq!(config.tools.packager.path, expect("~/bin/mp4dash"));
        // Bare names are left for PATH lookup.
        assert_eq!(config.tools.thumbnailer.path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn parse_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamforge.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[storage]
base_path = "/srv/videos"
permitted_extensions = ["mp4", "mov"]

[tools.packager]
path = "/opt/bento4/bin/mp4dash"

[timeouts]
package_secs = 120

[[ladder.renditions]]
name = "720p"
width = 1280
height = 720
bitrate_kbps = 1500
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.base_path, Path::new("/srv/videos"));
        assert_eq!(config.tools.packager.path, Path::new("/opt/bento4/bin/mp4dash"));
        // untouched fields keep their defaults
        assert_eq!(config.tools.packager.args, streamforge_av::PackagerTool::default().args);
        assert_eq!(config.timeouts.package_secs, 120);
        assert_eq!(config.timeouts.fragment_secs, 3600);
        assert_eq!(config.ladder.renditions, vec![Rendition::new("720p", 1280, 720, 1500)]);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.ladder.renditions.clear();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.timeouts.thumbnail_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.storage.permitted_extensions = vec!["../mp4".into()];
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.server.max_upload_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_file_is_error() {
        let err = load_config(Path::new("/nonexistent/streamforge.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
