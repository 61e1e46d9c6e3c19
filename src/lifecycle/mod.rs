//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Serving (http/server.rs):
//!     Bind → Starting → Serving (accept loop running)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Draining (stop accepting, finish in-flight)
//!     → Stopped (drained, or drain deadline elapsed)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown, once
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, report
//! - Drain has a hard deadline; overrunning it is reported, not hidden
//! - Exactly one outcome per lifecycle, delivered through a oneshot channel

use std::time::Duration;

use thiserror::Error;

use crate::net::ListenerError;

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::Signals;

/// Server lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// Failures that end the serving loop.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    /// Bind or accept failure unrelated to shutdown.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// In-flight requests did not finish before the deadline.
    #[error("graceful shutdown timed out after {timeout:?} with {in_flight} connection(s) still open")]
    DrainTimeout { timeout: Duration, in_flight: usize },

    /// The shutdown task vanished without reporting an outcome.
    #[error("shutdown task ended without reporting an outcome")]
    ShutdownAborted,
}
