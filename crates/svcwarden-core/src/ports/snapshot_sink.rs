//! Snapshot sink port.
//!
//! Monitor loops already log every snapshot via `tracing`; a sink lets the
//! embedding application receive them as values (dashboards, tests).

use crate::domain::{HealthSnapshot, PerformanceSnapshot};

/// Receiver for snapshots emitted by the monitor loops.
///
/// Called from the loop task; implementations should not block.
pub trait SnapshotSink: Send + Sync {
    fn on_health(&self, snapshot: &HealthSnapshot);

    fn on_performance(&self, snapshot: &PerformanceSnapshot);
}

/// A sink that discards all snapshots.
#[derive(Debug, Clone, Default)]
pub struct NoopSnapshotSink;

impl SnapshotSink for NoopSnapshotSink {
    fn on_health(&self, _snapshot: &HealthSnapshot) {}

    fn on_performance(&self, _snapshot: &PerformanceSnapshot) {}
}
