//! Ctrl-C handling.

use hushcat_app::Interrupt;
use tracing::warn;

/// Watch for Ctrl-C.
///
/// The first interrupt ends the conversation gracefully. A second one exits
/// at once, for when the peer never closes its side.
pub fn watch_interrupt() -> Interrupt {
    let (trigger, interrupt) = Interrupt::pair();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for interrupts: {e}");
            return;
        }
        trigger.fire();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted again; exiting without waiting for the peer");
            std::process::exit(1);
        }
    });

    interrupt
}
