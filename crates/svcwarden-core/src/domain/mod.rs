//! Domain types for the supervised service.
//!
//! These are pure data types with no process or network dependencies.

mod descriptor;
mod endpoint;
mod snapshot;
mod state;
mod status;

pub use descriptor::{DeploymentMeta, RegistrationPayload, ServiceDescriptor, default_catalog};
pub use endpoint::Endpoint;
pub use snapshot::{HealthSnapshot, PerformanceSnapshot, ResourceUsage};
pub use state::{DeploymentState, TransitionError};
pub use status::{DeploymentStatus, ShutdownReport};
