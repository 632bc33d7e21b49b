//! Ctrl-C handling
//!
//! Turns the process interrupt signal into a stop request for the running
//! session. The handler is registered before [`arm_interrupt`] returns, so a
//! signal sent once recording has started is never lost.

use crate::recorder::{InterruptFlag, SessionState};
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Register the Ctrl-C handler and watch for the signal in the background.
///
/// Fails when the handler cannot be installed; the interrupt flag is then
/// left alone.
pub async fn arm_interrupt(
    interrupt: InterruptFlag,
    state: Arc<RwLock<SessionState>>,
) -> io::Result<JoinHandle<()>> {
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());

    // The first poll installs the handler
    let early = tokio::select! {
        biased;
        result = &mut ctrl_c => Some(result),
        _ = std::future::ready(()) => None,
    };
    if let Some(result) = early {
        result?;
        on_signal(Ok(()), &interrupt, &state);
        return Ok(tokio::spawn(async {}));
    }

    Ok(tokio::spawn(async move {
        let result = ctrl_c.await;
        on_signal(result, &interrupt, &state);
    }))
}

fn on_signal(result: io::Result<()>, interrupt: &InterruptFlag, state: &RwLock<SessionState>) {
    match result {
        Ok(()) if *state.read() == SessionState::Stopped => {
            info!("Received shutdown signal after the session stopped");
        }
        Ok(()) => {
            info!("Received shutdown signal");
            interrupt.request();
        }
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}
