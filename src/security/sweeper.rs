//! Background eviction of idle rate-limit clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::security::rate_limit::ClientRegistry;

/// Handle to the sweeper task.
///
/// Dropping the handle stops the task at its next wakeup; [`Sweeper::stop`]
/// additionally waits for it to finish.
pub struct Sweeper {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub(crate) fn spawn(
        registry: Arc<ClientRegistry>,
        interval: Duration,
        stale_after: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(registry, interval, stale_after, stop_rx));
        Self { stop_tx, handle }
    }

    /// Stop sweeping and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Rate limit sweeper ended abnormally");
        }
    }
}

async fn run(
    registry: Arc<ClientRegistry>,
    interval: Duration,
    stale_after: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    tracing::debug!(
        interval_secs = interval.as_secs(),
        stale_after_secs = stale_after.as_secs(),
        "Rate limit sweeper starting"
    );

    // First tick is one full interval away, not immediate.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.sweep(Instant::now(), stale_after);
                if evicted > 0 {
                    metrics::record_rate_limit_evictions(evicted);
                    tracing::debug!(evicted, "Evicted idle rate limit clients");
                }
            }
            // Fires on stop() and when the handle is dropped.
            _ = &mut stop_rx => {
                tracing::debug!("Rate limit sweeper stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sweeper;
    use crate::config::RateLimitConfig;
    use crate::security::rate_limit::RateLimiter;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests_per_second: 1.0,
            burst: 1,
            sweep_interval_secs: 60,
            stale_after_secs: 180,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_idle_clients_on_schedule() {
        let limiter = limiter();
        let sweeper = limiter.spawn_sweeper();

        limiter.admit("idle");
        tokio::time::sleep(Duration::from_secs(110)).await;
        limiter.admit("active");

        // Sweeps at 60, 120 and 180 keep both.
        tokio::time::sleep(Duration::from_secs(80)).await;
        assert_eq!(limiter.client_count(), 2);

        // The sweep at 240 drops the client last seen at 0.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(limiter.client_count(), 1);
        assert!(limiter.tokens("active").is_some());

        sweeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_sweeping() {
        let limiter = limiter();
        let sweeper = limiter.spawn_sweeper();
        sweeper.stop().await;

        limiter.admit("a");
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(limiter.client_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_ends_the_task() {
        let limiter = limiter();
        let sweeper = limiter.spawn_sweeper();
        let handle_finished = {
            let Sweeper { stop_tx, handle } = sweeper;
            drop(stop_tx);
            handle
        };
        handle_finished.await.unwrap();
    }
}
