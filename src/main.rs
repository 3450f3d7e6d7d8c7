//! sharex-mcp server binary
//!
//! Bootstrap order: logging, config, directory resolution (explicit path
//! wins over ShareX auto-detection; neither resolving leaves the server in
//! degraded empty-cache mode), initial scan, watcher task, stdio serve.

use std::sync::Arc;

use anyhow::Result;
use rmcp::{ServiceExt, transport::stdio};
use sharex_mcp::{
    config::ServerConfig, mcp::ShareXMcpServer, service::ScreenshotLibrary, sharex,
    sync::DirectorySynchronizer, watch::{DEFAULT_DEBOUNCE, DirectoryWatcher},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol; all logging goes to stderr.
    // Respects RUST_LOG, default level info.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sharex_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("sharex-mcp server starting (transport: stdio)");

    let config = ServerConfig::from_env();

    let screenshots_dir = match &config.screenshots_dir {
        Some(dir) => Some(dir.clone()),
        None if config.auto_detect_sharex => sharex::detect_screenshots_dir().await,
        None => None,
    };
    // A configured or detected path that does not exist is as unusable as
    // no path at all
    let screenshots_dir = match screenshots_dir {
        Some(dir) if dir.is_dir() => {
            info!(dir = %dir.display(), "serving screenshots directory");
            Some(dir)
        }
        Some(dir) => {
            warn!(dir = %dir.display(), "screenshots directory does not exist");
            None
        }
        None => {
            warn!("no screenshots directory configured or detected; queries will report this");
            None
        }
    };

    let library = Arc::new(ScreenshotLibrary::new(config, screenshots_dir.clone()));

    if let Some(dir) = screenshots_dir {
        let sync = DirectorySynchronizer::new(Arc::clone(&library), dir.clone());
        match sync.initial_scan().await {
            Ok(summary) => {
                info!(images = summary.images, gifs = summary.gifs, "library seeded")
            }
            Err(e) => warn!("initial scan failed: {e}"),
        }

        match DirectoryWatcher::new(&dir, DEFAULT_DEBOUNCE) {
            Ok(mut watcher) => {
                tokio::spawn(async move {
                    loop {
                        for event in watcher.next_batch().await {
                            sync.apply_event(event).await;
                        }
                    }
                });
            }
            Err(e) => warn!("filesystem watcher unavailable, caches will go stale: {e}"),
        }
    }

    let service = ShareXMcpServer::new(library).serve(stdio()).await?;
    info!("sharex-mcp ready, waiting for MCP requests");

    service.waiting().await?;
    info!("sharex-mcp server shutting down");
    Ok(())
}
