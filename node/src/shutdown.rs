//! Shutdown signalling for the node's background tasks.
//!
//! Tasks hold a [`ShutdownSignal`] and `select!` on [`ShutdownSignal::wait`]
//! next to their main loop. Once triggered the signal stays set, so a task
//! that subscribes late still sees it.

use tokio::sync::watch;

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered, or the controller is gone.
    pub async fn wait(&mut self) {
        // An error means the controller was dropped, which also ends the node.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_is_notified() {
        let controller = ShutdownController::new();
        let mut a = controller.subscribe();
        let mut b = controller.subscribe();
        controller.shutdown();
        a.wait().await;
        b.wait().await;
        assert!(controller.is_shutdown());
    }

    #[tokio::test]
    async fn late_subscriber_sees_earlier_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        let mut late = controller.subscribe();
        late.wait().await;
    }

    #[tokio::test]
    async fn dropped_controller_releases_waiters() {
        let controller = ShutdownController::new();
        let mut signal = controller.subscribe();
        drop(controller);
        signal.wait().await;
    }
}
