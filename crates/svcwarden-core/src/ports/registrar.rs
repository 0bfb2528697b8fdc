//! Registrar port for declaring the service catalog to the child.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Endpoint, ServiceDescriptor};

/// Registration failed. Never fatal to a deployment that is already ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Nothing to register.
    #[error("Service catalog is empty")]
    EmptyCatalog,

    /// The request never produced a response.
    #[error("Registration transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Registration rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outcome of a successful registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub submitted: usize,
    pub acknowledged: usize,
}

impl RegistrationReceipt {
    /// The service accepted fewer descriptors than were sent.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.acknowledged < self.submitted
    }
}

/// Submits a descriptor catalog to a ready service.
///
/// Implementations must not probe readiness themselves and must submit the
/// whole catalog in a single request.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(
        &self,
        endpoint: &Endpoint,
        descriptors: &[ServiceDescriptor],
    ) -> Result<RegistrationReceipt, RegistrationError>;
}
