//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the supervisor expects from infrastructure
//! and from the embedding application. They contain no implementation
//! details and use only domain types.

pub mod log_sink;
pub mod registrar;
pub mod snapshot_sink;
pub mod status_source;

use thiserror::Error;

use crate::domain::DeploymentState;

pub use log_sink::{ChildLogSink, ChildStream, NoopLogSink};
pub use registrar::{RegistrationError, RegistrationReceipt, Registrar};
pub use snapshot_sink::{NoopSnapshotSink, SnapshotSink};
pub use status_source::{StatusReport, StatusSource};

/// The child process could not be created.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The configured program is not an existing path and is not on `PATH`.
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    /// The OS refused to start the process.
    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but reported no PID (it exited immediately).
    #[error("Spawned process has no PID")]
    MissingPid,
}

/// Readiness budget exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Service not ready after {attempts} attempt(s): {last_cause}")]
pub struct NotReadyError {
    /// Attempts made, always equal to the configured budget.
    pub attempts: u32,
    /// Description of the final failed attempt.
    pub last_cause: String,
}

/// First fatal cause of a failed `deploy()`.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// `deploy()` called on a supervisor that already left `NotStarted`.
    #[error("Cannot deploy from state {0}")]
    InvalidState(DeploymentState),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    /// The child exited while readiness was still being probed.
    #[error("Child exited before becoming ready: {status}")]
    ExitedEarly { status: String },

    /// A concurrent shutdown took over while deploying.
    #[error("Deployment interrupted in state {0}")]
    Interrupted(DeploymentState),
}

/// Transient failure inside a monitor loop observation.
///
/// Never fatal: the loop logs it and tries again on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// The status source could not produce a report.
    #[error("Status source unavailable: {0}")]
    Source(String),

    /// Inspecting the child process failed.
    #[error("Process inspection failed: {0}")]
    Process(String),
}

/// Shutdown could not signal or reap the child.
///
/// Grace-period expiry is not an error; it is reported through
/// `ShutdownReport::forced`.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Failed to terminate child {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}
