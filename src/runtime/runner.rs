use tokio::{select, signal::unix::SignalKind};

use super::shutdown;
use crate::controllers::HttpApiRouter;

/// Serves the HTTP API until SIGINT or SIGTERM, then shuts down.
pub(crate) async fn run(http_router: HttpApiRouter) {
    // Create HTTP shutdown channel (oneshot for single signal)
    let (http_shutdown_tx, http_shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let mut handle_http_events_task = tokio::task::spawn(async move {
        if let Err(error) = http_router
            .listen_and_handle_http_requests(http_shutdown_rx)
            .await
        {
            tracing::error!(error = %error, "HTTP server failed");
        }
    });

    let mut sigterm = match tokio::signal::unix::signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(error) => {
            tracing::error!(error = %error, "Failed to install SIGTERM handler");
            return;
        }
    };

    select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, initiating shutdown..."),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating shutdown..."),
        _ = &mut handle_http_events_task => {
            tracing::error!("HTTP server exited unexpectedly");
            return;
        }
    }

    shutdown::graceful_shutdown(shutdown::ShutdownContext {
        http_shutdown_tx,
        handle_http_events_task,
    })
    .await;
}
