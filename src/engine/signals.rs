// src/engine/signals.rs

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error};

/// Listen for SIGINT for the rest of the process's life.
///
/// Every interrupt is consumed so the default handler never terminates the
/// process, but the returned channel holds at most one pending request.
pub fn spawn_interrupt_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(forward_interrupts(tx));
    rx
}

async fn forward_interrupts(tx: mpsc::Sender<()>) {
    loop {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            return;
        }
        debug!("caught SIGINT");

        match tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => debug!("shutdown already requested"),
            Err(TrySendError::Closed(())) => debug!("dispatcher gone; ignoring SIGINT"),
        }
    }
}
