mod cli;

use streamforge::{
    config,
    pipeline::{PipelineRunner, ThumbnailStatus},
    server,
    store::{MemoryVideoStore, VideoDetails, VideoStore},
    tools,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use streamforge_common::{paths, OwnerId, StorageLayout, VideoId};

async fn start_server(host: String, port: u16, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Streamforge server");
    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamforge=trace,streamforge_av=trace,streamforge_common=debug,tower_http=debug"
                .to_string()
        } else {
            "streamforge=debug,streamforge_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Run {
            source,
            owner,
            video,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(
                &source,
                OwnerId::new(owner),
                VideoId::new(video),
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_file(
    source: &Path,
    owner: OwnerId,
    video: VideoId,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !source.is_file() {
        anyhow::bail!("Source file does not exist: {:?}", source);
    }
    if !paths::is_video_file(source) {
        anyhow::bail!("Not a known video container: {:?}", source);
    }
    let extension = paths::source_extension(source)
        .with_context(|| format!("Source has no usable extension: {:?}", source))?;

    let layout = StorageLayout::new(config.storage.base_path.clone());
    let dir = layout.resolve(owner, video);
    layout.ensure(&dir)?;

    let stored = dir.path().join(format!("video.{extension}"));
    if stored != source {
        tokio::fs::copy(source, &stored)
            .await
            .with_context(|| format!("Failed to copy source to {:?}", stored))?;
    }
    println!("Source: {}", stored.display());

    let store: Arc<dyn VideoStore> = Arc::new(MemoryVideoStore::new());
    store.register(owner, video, VideoDetails::default()).await?;
    let runner = PipelineRunner::new(&config, layout, store);
    let guard = runner.claim(owner, video)?;

    println!("Running pipeline ({} renditions)...", config.ladder.len());
    let report = runner.run(guard, stored).await?;

    println!("\nProcessing complete!");
    println!("Manifest: {}", report.manifest.display());
    println!("Verified references: {}", report.verified_references);
    match report.thumbnail {
        ThumbnailStatus::Extracted(path) => println!("Thumbnail: {}", path.display()),
        ThumbnailStatus::SoftFailure(reason) => println!("Thumbnail: skipped ({})", reason),
    }
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());

    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let statuses = tools::check_tools(&config).await;
    let mut all_ok = true;

    for status in &statuses {
        let tool = &status.info;
        let mark = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {} ({})", mark, status.role, tool.name);

        if let Some(ref version) = tool.version {
            print!(" {}", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("Some tools are missing. Install them or fix [tools] in the config.")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Storage: {}", config.storage.base_path.display());
            println!("  Max upload: {} bytes", config.server.max_upload_bytes);
            println!(
                "  Ladder v{}: {}",
                config.ladder.version,
                config
                    .ladder
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  Fragmenter: {}", config.tools.fragmenter.path.display());
            println!("  Packager: {}", config.tools.packager.path.display());
            println!("  Thumbnailer: {}", config.tools.thumbnailer.path.display());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            config::validate_config(&config)?;
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Storage: {}", config.storage.base_path.display());
        }
    }

    Ok(())
}
