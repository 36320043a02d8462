use std::time::Duration;

use tokio::task::JoinHandle;

/// In-flight export requests run under their own deadline; this only bounds
/// how long shutdown waits for them.
const HTTP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub(super) struct ShutdownContext {
    pub(super) http_shutdown_tx: tokio::sync::oneshot::Sender<()>,
    pub(super) handle_http_events_task: JoinHandle<()>,
}

pub(super) async fn graceful_shutdown(context: ShutdownContext) {
    let ShutdownContext {
        http_shutdown_tx,
        mut handle_http_events_task,
    } = context;

    tracing::info!("Shutting down gracefully...");

    // Stop accepting new connections, then let in-flight requests finish.
    let _ = http_shutdown_tx.send(());

    wait_for_shutdown_task(
        "http_server",
        HTTP_SHUTDOWN_TIMEOUT,
        &mut handle_http_events_task,
        true,
    )
    .await;

    tracing::info!("Shutdown complete");
}

async fn wait_for_shutdown_task(
    task: &str,
    timeout: Duration,
    handle: &mut JoinHandle<()>,
    abort_on_timeout: bool,
) {
    match tokio::time::timeout(timeout, &mut *handle).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::error!(
            task,
            error = ?error,
            "Shutdown task panicked"
        ),
        Err(_) if abort_on_timeout => {
            tracing::warn!(
                task,
                timeout_secs = timeout.as_secs(),
                "Shutdown timeout reached, aborting task"
            );
            handle.abort();
            let _ = handle.await;
        }
        Err(_) => tracing::warn!(
            task,
            timeout_secs = timeout.as_secs(),
            "Shutdown timeout reached"
        ),
    }
}
