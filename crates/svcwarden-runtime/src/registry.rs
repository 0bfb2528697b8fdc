//! HTTP service registry.
//!
//! Submits the whole descriptor catalog in one POST to the child's
//! registration path. The registry never probes: callers must only invoke it
//! once readiness has been confirmed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use svcwarden_core::{
    Endpoint, RegistrationError, RegistrationPayload, RegistrationReceipt, Registrar,
    ServiceDescriptor,
};
use tracing::{debug, info, warn};

use crate::probe::local_client;

/// [`Registrar`] that POSTs a JSON [`RegistrationPayload`].
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    client: Client,
    path: String,
    mode: String,
    timeout: Duration,
}

impl ServiceRegistry {
    /// Create a registry posting to `path` on the target endpoint.
    pub fn new(path: impl Into<String>, mode: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: local_client(),
            path: path.into(),
            mode: mode.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Registrar for ServiceRegistry {
    async fn register(
        &self,
        endpoint: &Endpoint,
        descriptors: &[ServiceDescriptor],
    ) -> Result<RegistrationReceipt, RegistrationError> {
        if descriptors.is_empty() {
            return Err(RegistrationError::EmptyCatalog);
        }

        let url = endpoint.url(&self.path);
        let payload = RegistrationPayload::new(descriptors.to_vec(), self.mode.clone());
        debug!(url = %url, services = descriptors.len(), "Submitting service catalog");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let submitted = descriptors.len();
        let acknowledged = acknowledged_count(&body)
            .unwrap_or(submitted)
            .min(submitted);
        let receipt = RegistrationReceipt {
            submitted,
            acknowledged,
        };

        if receipt.is_partial() {
            warn!(submitted, acknowledged, "Service accepted only part of the catalog");
        } else {
            info!(services = submitted, "Registered service catalog");
        }

        Ok(receipt)
    }
}

/// Read the acknowledged count from a response body.
///
/// Accepts `{"registered": <n>}` or `{"registered": [...]}`. Any other body
/// (including an empty one) yields `None`, meaning "assume all accepted".
fn acknowledged_count(body: &str) -> Option<usize> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("registered")? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, response::IntoResponse};
    use std::sync::{Arc, Mutex};
    use svcwarden_core::default_catalog;
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn serve(status: StatusCode, reply: Value) -> (Endpoint, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route(
                "/register",
                post(
                    move |State(store): State<Received>, Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            store.lock().unwrap().push(body);
                            (status, Json(reply)).into_response()
                        }
                    },
                ),
            )
            .with_state(Arc::clone(&received));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (Endpoint::new("127.0.0.1", port), received)
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new("/register", "production", Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_submits_full_catalog_in_one_request() {
        let (endpoint, received) = serve(StatusCode::OK, serde_json::json!({})).await;

        let receipt = registry()
            .register(&endpoint, &default_catalog())
            .await
            .unwrap();

        assert_eq!(receipt.submitted, 3);
        assert_eq!(receipt.acknowledged, 3);

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["services"].as_array().unwrap().len(), 3);
        assert_eq!(bodies[0]["deployment"]["mode"], "production");
    }

    #[tokio::test]
    async fn test_partial_acceptance_is_reported() {
        let (endpoint, _) = serve(StatusCode::OK, serde_json::json!({ "registered": 2 })).await;

        let receipt = registry()
            .register(&endpoint, &default_catalog())
            .await
            .unwrap();
        assert!(receipt.is_partial());
        assert_eq!(receipt.acknowledged, 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let (endpoint, _) = serve(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "boom" }),
        )
        .await;

        let err = registry()
            .register(&endpoint, &default_catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_empty_catalog_rejected_without_request() {
        let err = registry()
            .register(&Endpoint::new("127.0.0.1", 1), &[])
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::EmptyCatalog);
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = registry()
            .register(&Endpoint::new("127.0.0.1", port), &default_catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Transport(_)));
    }

    #[test]
    fn test_acknowledged_count_parsing() {
        assert_eq!(acknowledged_count(r#"{"registered": 3}"#), Some(3));
        assert_eq!(acknowledged_count(r#"{"registered": ["a", "b"]}"#), Some(2));
        assert_eq!(acknowledged_count(r#"{"ok": true}"#), None);
        assert_eq!(acknowledged_count(""), None);
    }
}
