//! Health and performance observers driven by the supervisor's monitor loops.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use svcwarden_core::{HealthSnapshot, ObserveError, PerformanceSnapshot};
use tracing::{info, warn};

use super::Shared;
use crate::monitor::Observer;
use crate::process::ResourceSampler;

/// Child liveness, endpoint reachability and registration status.
pub(crate) struct HealthObserver {
    shared: Arc<Shared>,
}

impl HealthObserver {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl Observer for HealthObserver {
    type Snapshot = HealthSnapshot;

    async fn observe(&mut self) -> Result<HealthSnapshot, ObserveError> {
        let exited = {
            let mut guard = self.shared.child.lock().await;
            match guard.as_mut() {
                Some(handle) => handle
                    .poll_exit()
                    .map_err(|e| ObserveError::Process(e.to_string()))?,
                // Handle already released by shutdown.
                None => return Err(ObserveError::Process("no child process".to_string())),
            }
        };

        if let Some(status) = exited {
            // A shutdown in progress owns the exit; fail() is then a no-op.
            self.shared.fail(format!("Child exited unexpectedly: {status}"));
            return Ok(HealthSnapshot::now(false, false, self.shared.is_registered()));
        }

        let reachable = match self
            .shared
            .probe
            .check_once(self.shared.health_probe_timeout)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(endpoint = %self.shared.probe.endpoint(), error = %e, "Health probe failed");
                false
            }
        };

        Ok(HealthSnapshot::now(true, reachable, self.shared.is_registered()))
    }

    fn report(&mut self, snapshot: HealthSnapshot) {
        info!(
            healthy = snapshot.is_healthy(),
            child_alive = snapshot.child_alive,
            endpoint_reachable = snapshot.endpoint_reachable,
            registered = snapshot.registered,
            "Health check"
        );
        self.shared.snapshot_sink.on_health(&snapshot);
        self.shared.store_health(snapshot);
    }
}

/// Status-source counters plus OS resource usage of the child.
pub(crate) struct PerformanceObserver {
    shared: Arc<Shared>,
    sampler: ResourceSampler,
}

impl PerformanceObserver {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            sampler: ResourceSampler::new(),
        }
    }
}

#[async_trait]
impl Observer for PerformanceObserver {
    type Snapshot = PerformanceSnapshot;

    async fn observe(&mut self) -> Result<PerformanceSnapshot, ObserveError> {
        let (pid, child_uptime) = {
            let guard = self.shared.child.lock().await;
            guard
                .as_ref()
                .map(|handle| (handle.pid(), handle.uptime()))
                .ok_or_else(|| ObserveError::Process("no child process".to_string()))?
        };

        let (counters, uptime) = match &self.shared.status_source {
            Some(source) => {
                let report = source.current_status()?;
                (report.counters, report.uptime)
            }
            None => (BTreeMap::new(), child_uptime),
        };

        Ok(PerformanceSnapshot {
            timestamp: Utc::now(),
            counters,
            uptime,
            resources: self.sampler.sample(pid),
        })
    }

    fn report(&mut self, snapshot: PerformanceSnapshot) {
        info!(
            uptime_secs = snapshot.uptime.as_secs(),
            counters = ?snapshot.counters,
            memory_bytes = snapshot.resources.map(|r| r.memory_bytes),
            cpu_percent = snapshot.resources.map(|r| r.cpu_percent),
            "Performance metrics"
        );
        self.shared.snapshot_sink.on_performance(&snapshot);
        self.shared.store_performance(snapshot);
    }
}
