//! Common test utilities.
//!
//! Provides a fake supervised service (health + registration endpoints)
//! recording every call in arrival order, and config helpers pointing a
//! supervisor at it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use serde_json::Value;
use svcwarden_core::{ChildCommand, Endpoint, SupervisorConfig};
use tokio::net::TcpListener;

/// One request seen by the fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Health { ok: bool },
    Register { services: usize },
}

#[derive(Clone)]
struct FakeState {
    calls: Arc<Mutex<Vec<Call>>>,
    health_requests: Arc<AtomicU32>,
    fail_first: u32,
    register_status: StatusCode,
}

/// Local HTTP server standing in for the child's endpoint.
pub struct FakeService {
    pub endpoint: Endpoint,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeService {
    /// Healthy service accepting registration.
    pub async fn healthy() -> Self {
        Self::start(0, StatusCode::OK).await
    }

    /// `/health` answers 503 for the first `fail_first` requests;
    /// `/register` always answers `register_status`.
    pub async fn start(fail_first: u32, register_status: StatusCode) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            calls: Arc::clone(&calls),
            health_requests: Arc::new(AtomicU32::new(0)),
            fail_first,
            register_status,
        };

        let app = Router::new()
            .route("/health", get(health))
            .route("/register", post(register))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await });

        Self {
            endpoint: Endpoint::new("127.0.0.1", port),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn register_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Register { .. }))
            .count()
    }
}

async fn health(State(state): State<FakeState>) -> StatusCode {
    let seen = state.health_requests.fetch_add(1, Ordering::SeqCst);
    let ok = seen >= state.fail_first;
    state.calls.lock().unwrap().push(Call::Health { ok });
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn register(State(state): State<FakeState>, Json(body): Json<Value>) -> StatusCode {
    let services = body["services"].as_array().map_or(0, Vec::len);
    state.calls.lock().unwrap().push(Call::Register { services });
    state.register_status
}

/// A port nothing listens on.
pub async fn closed_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

/// Config pointing at `endpoint` with short readiness delays.
pub fn config_for(endpoint: &Endpoint, command: ChildCommand) -> SupervisorConfig {
    let mut config = SupervisorConfig::with_defaults();
    config.command = command;
    config.endpoint.host = endpoint.host.clone();
    config.endpoint.port = endpoint.port;
    config.endpoint.health_path = Some("/health".to_string());
    config.readiness.max_attempts = 5;
    config.readiness.attempt_timeout_ms = 500;
    config.readiness.delay_ms = 20;
    config.grace_period_ms = 1_000;
    config
}

/// A child that stays up until signalled.
pub fn sleeper() -> ChildCommand {
    ChildCommand::new("sleep").with_args(["30"])
}

/// A shell child running `script`.
pub fn shell(script: &str) -> ChildCommand {
    ChildCommand::new("sh").with_args(["-c", script])
}
