use crate::config::Config;
use crate::pipeline::PipelineRunner;
use crate::store::{MemoryVideoStore, VideoStore};
use crate::streaming;
use crate::upload::UploadAssembler;
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use streamforge_common::StorageLayout;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod error;
pub mod routes_videos;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub layout: StorageLayout,
    /// Video records (owner lookup, view counter, status)
    pub store: Arc<dyn VideoStore>,
    pub runner: PipelineRunner,
    pub uploads: Arc<UploadAssembler>,
}

impl AppContext {
    pub fn new(config: Config, store: Arc<dyn VideoStore>) -> Self {
        let layout = StorageLayout::new(config.storage.base_path.clone());
        let runner = PipelineRunner::new(&config, layout.clone(), Arc::clone(&store));
        Self::with_runner(config, store, runner)
    }

    /// Build a context around an existing runner (custom pipeline callbacks).
    pub fn with_runner(config: Config, store: Arc<dyn VideoStore>, runner: PipelineRunner) -> Self {
        Self {
            layout: runner.layout().clone(),
            uploads: Arc::new(UploadAssembler::from_config(&config)),
            config: Arc::new(config),
            store,
            runner,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    let videos = streaming::segment_router()
        .merge(routes_videos::video_routes())
        // Upload size is enforced while streaming to disk.
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .route("/health", get(health_check))
        .nest("/videos", videos)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(reject_dot_segments)),
        )
        .with_state(ctx)
}

/// Refuse any request whose raw path contains `.`/`..` segments or encoded
/// separators, before routing and before any filesystem access.
async fn reject_dot_segments(request: Request, next: Next) -> Response {
    if has_unsafe_segment(request.uri().path()) {
        tracing::debug!(path = %request.uri().path(), "Rejected path with dot segments");
        return AppError::not_found("path").into_response();
    }
    next.run(request).await
}

fn has_unsafe_segment(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if ["%2e", "%2f", "%5c", "%00"].iter().any(|enc| lower.contains(enc)) {
        return true;
    }
    path.split('/').any(|seg| seg == "." || seg == ".." || seg.contains('\\'))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Start the HTTP server with the in-memory video store
pub async fn start_server(config: Config) -> Result<()> {
    start_server_with_store(config, Arc::new(MemoryVideoStore::new())).await
}

/// Start the HTTP server
pub async fn start_server_with_store(config: Config, store: Arc<dyn VideoStore>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    std::fs::create_dir_all(&config.storage.base_path).with_context(|| {
        format!(
            "Failed to create storage base path {:?}",
            config.storage.base_path
        )
    })?;

    tracing::info!(
        base_path = ?config.storage.base_path,
        ladder_version = config.ladder.version,
        renditions = config.ladder.len(),
        "Storage ready"
    );

    let ctx = AppContext::new(config, store);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
