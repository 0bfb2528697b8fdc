//! Core domain types and port definitions for svcwarden.
//!
//! This crate holds everything the supervisor needs to talk about a
//! supervised service without touching processes or sockets: the service
//! catalog, deployment state machine, snapshots, configuration and the
//! traits (ports) implemented by the runtime and by embedding applications.

pub mod config;
pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::{
    ChildCommand, ConfigError, DEFAULT_HEALTH_PATH, DEFAULT_HOST, DEFAULT_MODE, DEFAULT_PORT,
    DEFAULT_REGISTRATION_PATH, ENV_LOG_LEVEL, ENV_MODE, EndpointSettings, MonitorSettings,
    ReadinessSettings, SupervisorConfig,
};
pub use domain::{
    DeploymentMeta, DeploymentState, DeploymentStatus, Endpoint, HealthSnapshot,
    PerformanceSnapshot, RegistrationPayload, ResourceUsage, ServiceDescriptor, ShutdownReport,
    TransitionError, default_catalog,
};
pub use ports::{
    ChildLogSink, ChildStream, DeploymentError, NoopLogSink, NoopSnapshotSink, NotReadyError,
    ObserveError, RegistrationError, RegistrationReceipt, Registrar, ShutdownError, SnapshotSink,
    SpawnError, StatusReport, StatusSource,
};
