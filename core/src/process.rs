use tokio::{
    select,
    signal::unix::{signal, SignalKind},
};
use tracing::{debug, info};

// Functions

/// Resolves once SIGINT or SIGTERM is received.
pub async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let name = select! {
        _ = sigint.recv() => "sigint",
        _ = sigterm.recv() => "sigterm",
    };
    debug!(signal = name, "signal received");
    info!("shutting down");
    Ok(())
}
