//! OS signal handling.
//!
//! SIGINT and SIGTERM both request a graceful shutdown. The hook only fires
//! the coordinator; the cache is closed by the composition root once the HTTP
//! server has drained, so in-flight requests still see a ready manager.
//! Repeated signals are harmless since a second trigger is ignored.

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Resolve when the process receives SIGINT or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Fire `shutdown` once `trigger` resolves.
pub fn install_shutdown_hook<F>(shutdown: Shutdown, trigger: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        trigger.await;
        if shutdown.trigger() {
            tracing::info!("Shutdown requested");
        }
    })
}
