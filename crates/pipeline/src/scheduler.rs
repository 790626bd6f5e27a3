//! Fixed-interval driver for one pipeline stage.
//!
//! A [`TickScheduler`] runs its cycle once immediately and then once per
//! elapsed interval until its [`CancellationToken`] fires. Ticks that are
//! missed while a long cycle runs are skipped, never replayed in a burst.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Smallest interval accepted; `tokio::time::interval` panics on zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives a single stage on a fixed cadence.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    name: &'static str,
    interval: Duration,
    enabled: bool,
}

impl TickScheduler {
    pub fn new(name: &'static str, interval: Duration, enabled: bool) -> Self {
        Self {
            name,
            interval: interval.max(MIN_INTERVAL),
            enabled,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `cycle` on every tick until `cancel` fires.
    ///
    /// Cancellation only interrupts the wait between cycles. A cycle that is
    /// already executing receives a child token and is awaited to completion,
    /// so it can stop between items and commit what it finished.
    ///
    /// Returns the number of cycles that ran.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut cycle: F) -> u64
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.enabled {
            tracing::info!(scheduler = self.name, "Scheduler disabled, not starting");
            return 0;
        }

        tracing::info!(
            scheduler = self.name,
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(scheduler = self.name, cycles, "Scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    cycle(cancel.child_token()).await;
                    cycles += 1;
                }
            }
        }

        cycles
    }
}
