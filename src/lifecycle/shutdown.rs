//! Graceful stop for the HTTP front end.
//!
//! The binary hands one receiver to [`HttpServer::run`](crate::HttpServer::run)
//! and fires [`Shutdown::trigger`] from the signal task; tests fire it
//! directly to stop a server started on an ephemeral port.

use tokio::sync::broadcast;

/// One-shot stop signal fanned out to every subscriber.
///
/// Clones share the channel, so the signal task and the test harness can each
/// hold one. Receivers subscribed after the trigger never see it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A receiver for [`HttpServer::run`](crate::HttpServer::run) or any other
    /// task that should stop with the server.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Wake every subscriber. Safe to call more than once.
    pub fn trigger(&self) {
        let receivers = self.tx.send(()).unwrap_or(0);
        tracing::info!(receivers, "Shutdown triggered");
    }

    /// Receivers not yet dropped, i.e. servers and tasks still running.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
