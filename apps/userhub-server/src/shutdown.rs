use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Resolves on the first SIGTERM, SIGINT or Ctrl+C.
pub async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("shutdown: SIGTERM"),
            _ = sigint.recv()  => tracing::info!("shutdown: SIGINT"),
            _ = tokio::signal::ctrl_c() => tracing::info!("shutdown: ctrl_c"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown: ctrl_c");
        Ok(())
    }
}

/// Cancels `cancel` once a shutdown signal arrives.
pub fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(error = %e, "signal handler failed, falling back to ctrl_c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        cancel.cancel();
    });
}
