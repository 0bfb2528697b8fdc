//! Cancellable periodic observation loops.
//!
//! A [`MonitorLoop`] sleeps for its interval, asks its [`Observer`] for a
//! snapshot and reports it, until its cancellation token fires. A failed
//! observation is logged and the loop carries on with the next tick; only
//! cancellation ends it. Cancellation interrupts both the sleep and an
//! in-flight observation.

use std::time::Duration;

use async_trait::async_trait;
use svcwarden_core::ObserveError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Produces and reports one kind of snapshot.
#[async_trait]
pub trait Observer: Send {
    type Snapshot: Send;

    /// Take one observation.
    async fn observe(&mut self) -> Result<Self::Snapshot, ObserveError>;

    /// Publish a successful observation.
    fn report(&mut self, snapshot: Self::Snapshot);
}

/// Counters returned when a loop is joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Ticks that started an observation.
    pub ticks: u64,
    /// Observations that returned an error.
    pub failures: u64,
}

/// A named periodic loop bound to a cancellation token.
#[derive(Debug, Clone)]
pub struct MonitorLoop {
    name: &'static str,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl MonitorLoop {
    pub const fn new(
        name: &'static str,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            name,
            interval,
            cancel_token,
        }
    }

    /// Run until cancelled.
    pub async fn run<O: Observer>(self, mut observer: O) -> MonitorStats {
        let mut stats = MonitorStats::default();
        // First tick one full interval from now: sleep, then observe.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(monitor = self.name, interval = ?self.interval, "Monitor started");

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            stats.ticks += 1;
            let observation = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                result = observer.observe() => result,
            };

            match observation {
                Ok(snapshot) => observer.report(snapshot),
                Err(e) => {
                    stats.failures += 1;
                    warn!(
                        monitor = self.name,
                        tick = stats.ticks,
                        error = %e,
                        "Observation failed, continuing"
                    );
                }
            }
        }

        debug!(
            monitor = self.name,
            ticks = stats.ticks,
            failures = stats.failures,
            "Monitor cancelled"
        );
        stats
    }

    /// Run on a new task.
    pub fn spawn<O>(self, observer: O) -> JoinHandle<MonitorStats>
    where
        O: Observer + 'static,
    {
        tokio::spawn(self.run(observer))
    }
}
