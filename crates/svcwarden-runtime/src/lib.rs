//! Process supervision runtime for svcwarden.
//!
//! This crate implements the ports defined in `svcwarden-core` and drives
//! the deployment lifecycle:
//!
//! - [`ProcessSupervisor`]: spawn, readiness, registration, monitoring, shutdown
//! - [`ReadinessProbe`]: TCP or HTTP reachability with bounded retries
//! - [`ServiceRegistry`]: HTTP [`Registrar`](svcwarden_core::Registrar)
//! - [`MonitorLoop`]: cancellable periodic observation
//! - [`retry()`]: the retry primitive shared by probing and callers

pub mod monitor;
pub mod probe;
pub mod process;
pub mod registry;
pub mod retry;
pub mod supervisor;

pub use monitor::{MonitorLoop, MonitorStats, Observer};
pub use probe::{ProbeError, ReadinessProbe};
pub use process::{ProcessHandle, ResourceSampler, Termination, shutdown_child};
pub use registry::ServiceRegistry;
pub use retry::{AttemptError, DelayStrategy, RetryExhausted, RetryPolicy, retry};
pub use supervisor::{ProcessSupervisor, SupervisorBuilder};
