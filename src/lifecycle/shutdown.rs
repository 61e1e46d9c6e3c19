//! Shutdown coordination for the server.

use tokio::sync::watch;

use crate::lifecycle::LifecycleState;

/// Coordinator for graceful shutdown.
///
/// Holds the current [`LifecycleState`] in a watch channel. Every long-running
/// task subscribes and stops taking new work once the state reaches
/// `Draining`. Because the channel stores state rather than events, a task
/// that subscribes after the trigger still observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: std::sync::Arc<watch::Sender<LifecycleState>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator in the `Starting` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// `Starting → Serving`.
    pub fn mark_serving(&self) {
        self.advance(LifecycleState::Serving);
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` only for the call that moved the state to `Draining`;
    /// later calls have no effect.
    pub fn trigger(&self) -> bool {
        self.advance(LifecycleState::Draining)
    }

    /// Terminal transition.
    pub fn mark_stopped(&self) {
        self.advance(LifecycleState::Stopped);
    }

    fn advance(&self, next: LifecycleState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to tasks that must stop on shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<LifecycleState>,
}

impl ShutdownListener {
    /// Wait until shutdown has been triggered.
    ///
    /// Also returns if the coordinator is gone, since nobody can serve
    /// without it.
    pub async fn recv(&mut self) {
        let _ = self
            .rx
            .wait_for(|state| *state >= LifecycleState::Draining)
            .await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() >= LifecycleState::Draining
    }
}
