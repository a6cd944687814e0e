//! Single-fire interrupt signal.
//!
//! OS signal registration stays in the binary; the runtime only sees an
//! [`Interrupt`] that resolves at most once.

use std::future;

use tokio::sync::oneshot;

/// Sending half, owned by whoever watches for the interrupt.
#[derive(Debug)]
pub struct InterruptTrigger {
    sender: oneshot::Sender<()>,
}

impl InterruptTrigger {
    /// Fire the interrupt. Does nothing if the runtime is already gone.
    pub fn fire(self) {
        let _ = self.sender.send(());
    }
}

/// Receiving half, observed only by the runtime's event loop.
#[derive(Debug)]
pub struct Interrupt {
    signal: Option<oneshot::Receiver<()>>,
}

impl Interrupt {
    /// Create a connected trigger and interrupt.
    #[must_use]
    pub fn pair() -> (InterruptTrigger, Self) {
        let (sender, receiver) = oneshot::channel();
        (InterruptTrigger { sender }, Self { signal: Some(receiver) })
    }

    /// An interrupt that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { signal: None }
    }

    /// Resolve when the trigger fires.
    ///
    /// Resolves at most once; afterwards, and if the trigger is dropped
    /// without firing, this never resolves. Cancel safe.
    pub async fn fired(&mut self) {
        if let Some(signal) = &mut self.signal {
            let result = signal.await;
            self.signal = None;
            if result.is_ok() {
                return;
            }
        }
        future::pending::<()>().await;
    }
}
