//! Child process infrastructure.
//!
//! - `spawn` - program resolution, command building and output capture
//! - `ProcessHandle` - the owned child plus its start time and exit status
//! - `shutdown` - SIGTERM → grace period → SIGKILL escalation
//! - `ResourceSampler` - OS-level memory/CPU readings for a PID

mod handle;
mod resources;
pub mod shutdown;
mod spawn;

pub use handle::ProcessHandle;
pub use resources::ResourceSampler;
pub use shutdown::{Termination, shutdown_child};
pub use spawn::{resolve_program, spawn_child};
