//! Background queue processor.
//!
//! Polls the scheduler for waiting jobs and drains them. The scheduler's own
//! processing flag keeps this loop and `POST /api/queue/process` from ever
//! running two jobs at once.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Run until the cancellation token is triggered.
pub async fn run_processor(ctx: AppContext, cancel: CancellationToken) {
    let poll = Duration::from_millis(ctx.config.queue.poll_interval_ms.max(50));
    tracing::info!(poll_ms = poll.as_millis() as u64, "Queue processor started");

    loop {
        if ctx.scheduler.waiting_count() > 0 && !ctx.scheduler.is_processing() {
            tokio::select! {
                processed = ctx.scheduler.process_queue() => {
                    if processed > 0 {
                        tracing::debug!(processed, "queue drained");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::warn!("Shutdown interrupted a running job");
                    break;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Queue processor stopped");
}
