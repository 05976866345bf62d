//! Graceful shutdown

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for Ctrl+C or SIGTERM, then cancel `token` so every server stops accepting work
pub async fn signal_handler(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => return,
    }

    info!("Terminate signal received, starting graceful shutdown");
    token.cancel();
}
