//! vf-server: the HTTP relay, the queue API and the background processor.
//!
//! This crate provides:
//!
//! - The transcoding relay (`POST /process-video`, `GET /download/{filename}`)
//! - Queue and result endpoints under `/api`, plus an SSE event stream
//! - A background processor that drains the job queue
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod processor;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use vf_core::config::Config;

pub use crate::context::AppContext;
pub use crate::router::build_router;

/// Start the server and block until a shutdown signal arrives.
pub async fn start(config: Config) -> vf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| vf_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let auto_process = config.queue.auto_process;

    let ctx = AppContext::from_config(config)?;
    for info in ctx.tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }
    if let Err(e) = ctx.scheduler.restore() {
        tracing::warn!("Failed to restore queue history: {e}");
    }

    let cancel = CancellationToken::new();

    let processor_handle = auto_process.then(|| {
        let processor_ctx = ctx.clone();
        let processor_cancel = cancel.clone();
        tokio::spawn(async move {
            processor::run_processor(processor_ctx, processor_cancel).await;
        })
    });

    let app = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| vf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    let shutdown = shutdown_signal(cancel.clone());
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!("Server error: {e}");
    }

    cancel.cancel();
    if let Some(handle) = processor_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGINT, SIGTERM or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
