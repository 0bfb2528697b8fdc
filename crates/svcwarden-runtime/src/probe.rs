//! Readiness probing for the supervised service.
//!
//! A probe attempt is either a plain TCP connect or an HTTP GET on a health
//! path expecting a 2xx status. Connection refused, timeouts and non-2xx
//! answers are all "not ready yet" and retried identically.

use std::time::Duration;

use reqwest::Client;
use svcwarden_core::{Endpoint, NotReadyError};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::retry::{RetryPolicy, retry};

/// A single failed probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("health check returned status {0}")]
    Status(u16),

    #[error("probe timed out after {0}ms")]
    Timeout(u128),
}

#[derive(Debug, Clone)]
enum ProbeKind {
    Tcp,
    Http { url: String, client: Client },
}

/// Reachability check against one endpoint.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    endpoint: Endpoint,
    kind: ProbeKind,
}

impl ReadinessProbe {
    /// Probe by opening a TCP connection.
    pub const fn tcp(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            kind: ProbeKind::Tcp,
        }
    }

    /// Probe with `GET http://endpoint{path}`, expecting a 2xx status.
    pub fn http(endpoint: Endpoint, path: &str) -> Self {
        let url = endpoint.url(path);
        Self {
            endpoint,
            kind: ProbeKind::Http {
                url,
                client: local_client(),
            },
        }
    }

    /// HTTP probe when a path is configured, TCP otherwise.
    pub fn for_endpoint(endpoint: Endpoint, health_path: Option<&str>) -> Self {
        match health_path {
            Some(path) => Self::http(endpoint, path),
            None => Self::tcp(endpoint),
        }
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Single-shot check bounded by `limit`.
    pub async fn check_once(&self, limit: Duration) -> Result<(), ProbeError> {
        timeout(limit, self.attempt())
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit.as_millis())))
    }

    /// Probe until the endpoint answers or the budget is spent.
    ///
    /// Returns the number of attempts it took. On failure the error carries
    /// exactly `policy.max_attempts` attempts (minimum 1).
    pub async fn wait_ready(&self, policy: &RetryPolicy) -> Result<u32, NotReadyError> {
        info!(
            endpoint = %self.endpoint,
            max_attempts = policy.max_attempts,
            "Waiting for service to become ready"
        );

        let result = retry(policy, |attempt| async move {
            self.attempt().await.map(|()| attempt)
        })
        .await;

        match result {
            Ok(attempts) => {
                info!(endpoint = %self.endpoint, attempts, "Service is ready");
                Ok(attempts)
            }
            Err(exhausted) => {
                warn!(
                    endpoint = %self.endpoint,
                    attempts = exhausted.attempts,
                    last_error = %exhausted.last,
                    "Service did not become ready"
                );
                Err(NotReadyError {
                    attempts: exhausted.attempts,
                    last_cause: exhausted.last.to_string(),
                })
            }
        }
    }

    async fn attempt(&self) -> Result<(), ProbeError> {
        match &self.kind {
            ProbeKind::Tcp => {
                let addr = (self.endpoint.host.as_str(), self.endpoint.port);
                TcpStream::connect(addr)
                    .await
                    .map(drop)
                    .map_err(|e| self.connect_error(&e))
            }
            ProbeKind::Http { url, client } => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| self.connect_error(&e))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    debug!(url = %url, %status, "Health check returned non-success status");
                    Err(ProbeError::Status(status.as_u16()))
                }
            }
        }
    }

    fn connect_error(&self, err: &dyn std::error::Error) -> ProbeError {
        ProbeError::Connect {
            endpoint: self.endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

/// HTTP client for talking to a locally supervised child.
///
/// System proxies are bypassed: the child is always addressed directly.
pub(crate) fn local_client() -> Client {
    Client::builder()
        .no_proxy()
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::net::TcpListener;

    /// A port that refuses connections: bind, read the port, release it.
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(
            max_attempts,
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_exact_budget() {
        let port = closed_port().await;
        let probe = ReadinessProbe::tcp(Endpoint::new("127.0.0.1", port));

        let err = probe.wait_ready(&fast_policy(3)).await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(err.last_cause.contains("connect"), "{}", err.last_cause);
    }

    #[tokio::test]
    async fn test_tcp_probe_succeeds_first_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = ReadinessProbe::tcp(Endpoint::new("127.0.0.1", port));

        assert_eq!(probe.wait_ready(&fast_policy(3)).await, Ok(1));
    }

    #[tokio::test]
    async fn test_http_probe_retries_until_healthy() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/health",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let probe = ReadinessProbe::http(Endpoint::new("127.0.0.1", port), "/health");
        assert_eq!(probe.wait_ready(&fast_policy(5)).await, Ok(3));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_check_once_reports_status() {
        let app = Router::new().route("/health", get(|| async { StatusCode::NOT_FOUND }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let probe = ReadinessProbe::http(Endpoint::new("127.0.0.1", port), "/health");
        assert_eq!(
            probe.check_once(Duration::from_secs(2)).await,
            Err(ProbeError::Status(404))
        );
    }
}
