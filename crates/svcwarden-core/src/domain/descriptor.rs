//! Service descriptors and the registration payload.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logical capability bundle declared to the supervised service.
///
/// Descriptors are immutable once built; the catalog handed to the
/// supervisor is a fixed ordered `Vec<ServiceDescriptor>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Paths on the service that expose this capability bundle, in order.
    pub endpoints: Vec<String>,
    pub capabilities: BTreeSet<String>,
}

impl ServiceDescriptor {
    /// Create a descriptor with no endpoints or capabilities.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            endpoints: Vec::new(),
            capabilities: BTreeSet::new(),
        }
    }

    /// Append an endpoint path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Add capabilities to the set.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }
}

/// The catalog registered when the caller does not supply one.
pub fn default_catalog() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new(
            "collaboration",
            "2.4.0",
            "Multi-role collaborative decision service",
        )
        .with_endpoint("/mcp")
        .with_capabilities([
            "strategic_thinking",
            "ux_design",
            "technical_implementation",
        ]),
        ServiceDescriptor::new("memory", "2.4.0", "Memory storage and retrieval service")
            .with_endpoint("/mcp")
            .with_capabilities(["memory_storage", "intelligent_retrieval"]),
        ServiceDescriptor::new("tasks", "2.4.0", "Task and workflow management service")
            .with_endpoint("/mcp")
            .with_capabilities(["task_creation", "workflow_execution"]),
    ]
}

/// Deployment metadata sent alongside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMeta {
    /// Operating mode (e.g. "production").
    pub mode: String,
    /// When the registration request was built.
    pub timestamp: DateTime<Utc>,
    /// Whether the service is fronted by an in-process bridge.
    pub bridge: bool,
}

/// Body of the single registration POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub services: Vec<ServiceDescriptor>,
    pub deployment: DeploymentMeta,
}

impl RegistrationPayload {
    /// Build a payload stamped with the current time.
    pub fn new(services: Vec<ServiceDescriptor>, mode: impl Into<String>) -> Self {
        Self {
            services,
            deployment: DeploymentMeta {
                mode: mode.into(),
                timestamp: Utc::now(),
                bridge: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_three_services_in_order() {
        let catalog = default_catalog();
        let names: Vec<_> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["collaboration", "memory", "tasks"]);
        assert!(catalog.iter().all(|d| d.endpoints == ["/mcp"]));
        assert!(catalog[1].capabilities.contains("intelligent_retrieval"));
    }

    #[test]
    fn test_capabilities_are_deduplicated() {
        let descriptor =
            ServiceDescriptor::new("a", "1", "d").with_capabilities(["x", "y", "x"]);
        assert_eq!(descriptor.capabilities.len(), 2);
    }

    #[test]
    fn test_payload_serialization_shape() {
        let payload = RegistrationPayload::new(default_catalog(), "production");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["services"].as_array().unwrap().len(), 3);
        assert_eq!(json["deployment"]["mode"], "production");
        assert_eq!(json["deployment"]["bridge"], true);
        assert!(json["services"][0]["capabilities"].is_array());
    }
}
