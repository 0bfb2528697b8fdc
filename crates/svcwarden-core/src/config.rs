//! Supervisor configuration types and validation.
//!
//! Pure data with serde support so adapters can load it from a file or
//! build it in code. Durations are stored as integer milliseconds/seconds
//! and exposed through `Duration` accessors.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Endpoint;

/// Default host the supervised service listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port the supervised service listens on.
pub const DEFAULT_PORT: u16 = 3000;

/// Default HTTP health path.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Default HTTP path receiving the registration POST.
pub const DEFAULT_REGISTRATION_PATH: &str = "/register";

/// Default operating mode passed to the child and to registration.
pub const DEFAULT_MODE: &str = "production";

/// Environment key carrying the child's log level.
pub const ENV_LOG_LEVEL: &str = "SVC_LOG_LEVEL";

/// Environment key carrying the child's operating mode.
pub const ENV_MODE: &str = "SVC_MODE";

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Child program must not be empty")]
    EmptyProgram,

    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("{field} must start with '/': {value}")]
    InvalidPath { field: &'static str, value: String },

    #[error("Readiness attempt budget must be at least 1")]
    ZeroAttempts,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Backoff factor must be a finite number >= 1.0, got {0}")]
    InvalidBackoffFactor(String),
}

/// How to launch the supervised child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildCommand {
    /// Program name (looked up on `PATH`) or path.
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child. Values are opaque to svcwarden.
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ChildCommand {
    /// Create a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for ChildCommand {
    fn default() -> Self {
        Self::new("node").with_args(["bin/server.js"])
    }
}

/// Where the child is reachable and which paths it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub host: String,
    pub port: u16,
    /// HTTP health path, `/health` by default. `None` (`null` in a config
    /// file) probes with a plain TCP connect.
    pub health_path: Option<String>,
    pub registration_path: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            health_path: Some(DEFAULT_HEALTH_PATH.to_string()),
            registration_path: DEFAULT_REGISTRATION_PATH.to_string(),
        }
    }
}

impl EndpointSettings {
    /// The endpoint address.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

/// Readiness retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
    /// Delay before the second attempt.
    pub delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt (1.0 = fixed).
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout_ms: 2_000,
            delay_ms: 1_000,
            backoff_factor: 1.0,
            max_delay_ms: 10_000,
        }
    }
}

impl ReadinessSettings {
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Monitor loop cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub health_interval_ms: u64,
    pub performance_interval_ms: u64,
    /// Timeout for the single-shot probe inside each health tick.
    pub health_probe_timeout_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            health_interval_ms: 60_000,
            performance_interval_ms: 300_000,
            health_probe_timeout_ms: 2_000,
        }
    }
}

impl MonitorSettings {
    pub const fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub const fn performance_interval(&self) -> Duration {
        Duration::from_millis(self.performance_interval_ms)
    }

    pub const fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }
}

/// Full configuration of one supervised deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub command: ChildCommand,
    pub endpoint: EndpointSettings,
    pub readiness: ReadinessSettings,
    pub monitor: MonitorSettings,
    /// Timeout for the registration request.
    pub registration_timeout_ms: u64,
    /// Default grace period used by adapters when calling `shutdown`.
    pub grace_period_ms: u64,
    /// Operating mode, forwarded to the child and the registration payload.
    pub mode: String,
    /// Log level forwarded to the child.
    pub child_log_level: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SupervisorConfig {
    /// Create a configuration with sensible defaults.
    pub fn with_defaults() -> Self {
        Self {
            command: ChildCommand::default(),
            endpoint: EndpointSettings::default(),
            readiness: ReadinessSettings::default(),
            monitor: MonitorSettings::default(),
            registration_timeout_ms: 5_000,
            grace_period_ms: 5_000,
            mode: DEFAULT_MODE.to_string(),
            child_log_level: "info".to_string(),
        }
    }

    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub const fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    /// Environment handed to the child.
    ///
    /// The mode and log level keys are filled in unless the command's own
    /// environment already sets them.
    pub fn child_env(&self) -> BTreeMap<String, String> {
        let mut env = self.command.env.clone();
        env.entry(ENV_LOG_LEVEL.to_string())
            .or_insert_with(|| self.child_log_level.clone());
        env.entry(ENV_MODE.to_string())
            .or_insert_with(|| self.mode.clone());
        env
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        if self.endpoint.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if let Some(path) = &self.endpoint.health_path {
            validate_path("health_path", path)?;
        }
        validate_path("registration_path", &self.endpoint.registration_path)?;

        let readiness = &self.readiness;
        if readiness.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if readiness.attempt_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("attempt_timeout_ms"));
        }
        if !readiness.backoff_factor.is_finite() || readiness.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(
                readiness.backoff_factor.to_string(),
            ));
        }

        let monitor = &self.monitor;
        if monitor.health_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("health_interval_ms"));
        }
        if monitor.performance_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("performance_interval_ms"));
        }
        if monitor.health_probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("health_probe_timeout_ms"));
        }
        if self.registration_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("registration_timeout_ms"));
        }

        Ok(())
    }
}

fn validate_path(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::InvalidPath {
            field,
            value: value.to_string(),
        })
    }
}
