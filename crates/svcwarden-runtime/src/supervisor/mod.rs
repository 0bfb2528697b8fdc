//! Process supervisor owning one deployment of the service host.
//!
//! The ProcessSupervisor spawns the child, waits for it to become reachable,
//! registers the service catalog and then keeps a health loop and a
//! performance loop running until shutdown.
//!
//! Key design decisions:
//! - **Single owner**: the child handle, state and loop handles all live
//!   inside the supervisor; callers only hold `&self`
//! - **Atomic transitions**: every state change goes through one watch
//!   sender; the first terminal state wins
//! - **Loops before child**: shutdown cancels and joins both loops before
//!   the child is signalled
//! - **Registration is best-effort**: a rejected or failed registration is
//!   logged and the deployment still reaches `Running`

mod observe;
mod state;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use svcwarden_core::{
    ChildLogSink, ConfigError, DeploymentError, DeploymentState, DeploymentStatus, Endpoint,
    HealthSnapshot, NoopLogSink, NoopSnapshotSink, PerformanceSnapshot, Registrar,
    ServiceDescriptor, ShutdownError, ShutdownReport, SnapshotSink, SpawnError, StatusSource,
    SupervisorConfig, default_catalog,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::monitor::{MonitorLoop, MonitorStats};
use crate::probe::ReadinessProbe;
use crate::process::{ProcessHandle, resolve_program, shutdown_child, spawn_child};
use crate::registry::ServiceRegistry;
use crate::retry::RetryPolicy;

use observe::{HealthObserver, PerformanceObserver};
use state::StateCell;

/// How often `deploy()` checks whether the child died while probing.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the supervisor and its monitor loops.
pub(crate) struct Shared {
    state: StateCell,
    child: Mutex<Option<ProcessHandle>>,
    probe: ReadinessProbe,
    health_probe_timeout: Duration,
    registered: AtomicUsize,
    failure: RwLock<Option<String>>,
    last_health: RwLock<Option<HealthSnapshot>>,
    last_performance: RwLock<Option<PerformanceSnapshot>>,
    cancel_token: CancellationToken,
    status_source: Option<Arc<dyn StatusSource>>,
    snapshot_sink: Arc<dyn SnapshotSink>,
    log_sink: Arc<dyn ChildLogSink>,
}

impl Shared {
    /// Enter `Failed`, record the reason and stop the loops.
    ///
    /// Returns `false` when another terminal state or a shutdown got there
    /// first; nothing is recorded then.
    fn fail(&self, reason: String) -> bool {
        match self.state.transition(DeploymentState::Failed) {
            Ok(from) => {
                error!(%from, reason = %reason, "Deployment failed");
                *self.failure.write().unwrap_or_else(PoisonError::into_inner) = Some(reason);
                self.cancel_token.cancel();
                true
            }
            Err(e) => {
                debug!(state = %e.from, reason = %reason, "Ignoring failure outside deployment");
                false
            }
        }
    }

    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst) > 0
    }

    fn store_health(&self, snapshot: HealthSnapshot) {
        *self
            .last_health
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    fn store_performance(&self, snapshot: PerformanceSnapshot) {
        *self
            .last_performance
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

struct Monitors {
    health: JoinHandle<MonitorStats>,
    performance: JoinHandle<MonitorStats>,
}

/// Builder for [`ProcessSupervisor`].
///
/// Everything except the configuration is optional: the catalog defaults to
/// [`default_catalog`], the registrar to an HTTP [`ServiceRegistry`] and the
/// sinks to no-ops.
pub struct SupervisorBuilder {
    config: SupervisorConfig,
    catalog: Option<Vec<ServiceDescriptor>>,
    registrar: Option<Arc<dyn Registrar>>,
    status_source: Option<Arc<dyn StatusSource>>,
    snapshot_sink: Option<Arc<dyn SnapshotSink>>,
    log_sink: Option<Arc<dyn ChildLogSink>>,
}

impl SupervisorBuilder {
    #[must_use]
    pub fn catalog(mut self, catalog: Vec<ServiceDescriptor>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn registrar(mut self, registrar: Arc<dyn Registrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    #[must_use]
    pub fn status_source(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.status_source = Some(source);
        self
    }

    #[must_use]
    pub fn snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn ChildLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Validate the configuration and build the supervisor.
    ///
    /// # Errors
    ///
    /// Returns the first invalid configuration value.
    pub fn build(self) -> Result<ProcessSupervisor, ConfigError> {
        let config = self.config;
        config.validate()?;

        let registrar = self.registrar.unwrap_or_else(|| {
            Arc::new(ServiceRegistry::new(
                config.endpoint.registration_path.clone(),
                config.mode.clone(),
                config.registration_timeout(),
            ))
        });
        let probe = ReadinessProbe::for_endpoint(
            config.endpoint.endpoint(),
            config.endpoint.health_path.as_deref(),
        );

        let shared = Arc::new(Shared {
            state: StateCell::new(),
            child: Mutex::new(None),
            probe,
            health_probe_timeout: config.monitor.health_probe_timeout(),
            registered: AtomicUsize::new(0),
            failure: RwLock::new(None),
            last_health: RwLock::new(None),
            last_performance: RwLock::new(None),
            cancel_token: CancellationToken::new(),
            status_source: self.status_source,
            snapshot_sink: self
                .snapshot_sink
                .unwrap_or_else(|| Arc::new(NoopSnapshotSink)),
            log_sink: self.log_sink.unwrap_or_else(|| Arc::new(NoopLogSink)),
        });

        Ok(ProcessSupervisor {
            config,
            catalog: self.catalog.unwrap_or_else(default_catalog),
            registrar,
            shared,
            monitors: Mutex::new(None),
        })
    }
}

/// Supervisor for one child process deployment.
///
/// A supervisor deploys at most once. After `Stopped` or `Failed` a new
/// supervisor has to be built.
///
/// # Example
///
/// ```ignore
/// let supervisor = ProcessSupervisor::builder(SupervisorConfig::with_defaults()).build()?;
/// supervisor.deploy().await?;
/// println!("Status: {:?}", supervisor.status().await);
/// supervisor.shutdown(Duration::from_secs(5)).await?;
/// ```
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    catalog: Vec<ServiceDescriptor>,
    registrar: Arc<dyn Registrar>,
    shared: Arc<Shared>,
    /// Loop handles, present from `Running` until shutdown joins them.
    monitors: Mutex<Option<Monitors>>,
}

impl ProcessSupervisor {
    pub fn builder(config: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder {
            config,
            catalog: None,
            registrar: None,
            status_source: None,
            snapshot_sink: None,
            log_sink: None,
        }
    }

    /// Supervisor with the default catalog, HTTP registry and no-op sinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SupervisorConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &[ServiceDescriptor] {
        &self.catalog
    }

    pub fn state(&self) -> DeploymentState {
        self.shared.state.get()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<DeploymentState> {
        self.shared.state.subscribe()
    }

    /// Wait until the deployment reaches `Stopped` or `Failed`.
    pub async fn wait_terminal(&self) -> DeploymentState {
        self.shared.state.wait_for(|state| state.is_terminal()).await
    }

    /// PID of the child while the supervisor holds it.
    pub async fn pid(&self) -> Option<u32> {
        self.shared.child.lock().await.as_ref().map(ProcessHandle::pid)
    }

    /// Check that the configured program can be resolved.
    ///
    /// `deploy()` performs the same check before spawning.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::ProgramNotFound`] if the program does not exist.
    pub fn preflight(&self) -> Result<PathBuf, SpawnError> {
        resolve_program(&self.config.command.program)
    }

    /// Spawn the child, wait for readiness, register and start monitoring.
    ///
    /// On success the deployment is `Running` with both monitor loops
    /// started. On failure it is `Failed`, no loop was started and the child
    /// is not left running.
    ///
    /// # Errors
    ///
    /// - [`DeploymentError::InvalidState`] if called more than once
    /// - [`DeploymentError::Spawn`] if the child could not be started
    /// - [`DeploymentError::NotReady`] if the readiness budget ran out
    /// - [`DeploymentError::ExitedEarly`] if the child died while probing
    /// - [`DeploymentError::Interrupted`] if `shutdown()` took over
    pub async fn deploy(&self) -> Result<(), DeploymentError> {
        if let Err(e) = self.shared.state.transition(DeploymentState::Starting) {
            return Err(DeploymentError::InvalidState(e.from));
        }
        let endpoint = self.shared.probe.endpoint().clone();
        info!(
            program = %self.config.command.program,
            %endpoint,
            mode = %self.config.mode,
            "Deploying service host"
        );

        let handle = match spawn_child(
            &self.config.command,
            &self.config.child_env(),
            Arc::clone(&self.shared.log_sink),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.fail(e.to_string());
                return Err(e.into());
            }
        };
        let pid = handle.pid();
        self.store_child(handle).await?;

        let policy = RetryPolicy::from(&self.config.readiness);
        let readiness = tokio::select! {
            result = self.shared.probe.wait_ready(&policy) => result.map_err(DeploymentError::from),
            err = self.watch_early_exit() => Err(err),
        };
        if let Err(e) = readiness {
            return Err(self.abort_deploy(e).await);
        }

        self.advance(DeploymentState::Ready)?;
        self.advance(DeploymentState::Registering)?;
        self.register(&endpoint).await;

        // Held while entering Running so a concurrent shutdown joins the
        // loops started here.
        let mut monitors = self.monitors.lock().await;
        self.advance(DeploymentState::Running)?;
        *monitors = Some(self.spawn_monitors());
        drop(monitors);

        info!(
            pid,
            %endpoint,
            registered = self.shared.registered.load(Ordering::SeqCst),
            "Deployment running"
        );
        Ok(())
    }

    /// Stop monitoring and terminate the child.
    ///
    /// Sends SIGTERM, waits up to `grace` and kills the child if it is still
    /// running. Idempotent: on an already stopped or failed deployment this
    /// returns a report with `signalled == false`.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Signal`] if the child could not be signalled
    /// or reaped. The deployment is still marked `Stopped`.
    pub async fn shutdown(&self, grace: Duration) -> Result<ShutdownReport, ShutdownError> {
        let started = Instant::now();

        loop {
            let current = self.shared.state.get();
            if current.is_terminal() {
                self.release().await;
                debug!(state = %current, "Shutdown requested on finished deployment");
                return Ok(ShutdownReport::noop(current, started.elapsed()));
            }
            if current == DeploymentState::ShuttingDown {
                let state = self.wait_terminal().await;
                return Ok(ShutdownReport::noop(state, started.elapsed()));
            }

            let target = if current == DeploymentState::NotStarted {
                DeploymentState::Stopped
            } else {
                DeploymentState::ShuttingDown
            };
            match self.shared.state.transition(target) {
                Ok(_) if target == DeploymentState::Stopped => {
                    self.shared.cancel_token.cancel();
                    info!("Supervisor stopped before deployment");
                    return Ok(ShutdownReport::noop(target, started.elapsed()));
                }
                Ok(_) => break,
                // State moved underneath us; look again.
                Err(_) => continue,
            }
        }

        info!(?grace, "Shutting down deployment");
        self.stop_monitors().await;

        let handle = self.shared.child.lock().await.take();
        let Some(mut handle) = handle else {
            let state = self.mark_stopped();
            return Ok(ShutdownReport::noop(state, started.elapsed()));
        };

        let pid = handle.pid();
        let already_exited = matches!(handle.poll_exit(), Ok(Some(_)));
        let result = shutdown_child(handle.child_mut(), grace).await;
        let state = self.mark_stopped();

        match result {
            Ok(termination) => {
                let elapsed = started.elapsed();
                info!(
                    pid,
                    forced = termination.forced,
                    status = %termination.status,
                    ?elapsed,
                    "Child stopped"
                );
                Ok(ShutdownReport {
                    state,
                    signalled: !already_exited,
                    forced: termination.forced,
                    exit_code: termination.status.code(),
                    elapsed,
                })
            }
            Err(source) => {
                error!(pid, error = %source, "Failed to terminate child");
                Err(ShutdownError::Signal { pid, source })
            }
        }
    }

    /// Point-in-time report of the deployment.
    pub async fn status(&self) -> DeploymentStatus {
        let (pid, started_at, uptime) = match self.shared.child.lock().await.as_ref() {
            Some(handle) => (
                Some(handle.pid()),
                Some(handle.started_at()),
                Some(handle.uptime()),
            ),
            None => (None, None, None),
        };

        DeploymentStatus {
            state: self.state(),
            pid,
            endpoint: self.shared.probe.endpoint().clone(),
            registered_services: self.shared.registered.load(Ordering::SeqCst),
            started_at,
            uptime,
            failure: self
                .shared
                .failure
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            last_health: self
                .shared
                .last_health
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            last_performance: self
                .shared
                .last_performance
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Put the spawned child in the shared slot unless shutdown already ran.
    async fn store_child(&self, mut handle: ProcessHandle) -> Result<(), DeploymentError> {
        {
            let mut slot = self.shared.child.lock().await;
            let state = self.shared.state.get();
            if state == DeploymentState::Starting {
                *slot = Some(handle);
                return Ok(());
            }
        }

        let state = self.shared.state.get();
        warn!(pid = handle.pid(), %state, "Deployment interrupted during spawn, killing child");
        if let Err(e) = shutdown_child(handle.child_mut(), Duration::ZERO).await {
            warn!(error = %e, "Failed to kill interrupted child");
        }
        Err(DeploymentError::Interrupted(state))
    }

    /// Resolves when the child exits or shutdown takes the handle.
    async fn watch_early_exit(&self) -> DeploymentError {
        let mut ticker = interval(EXIT_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = self.shared.cancel_token.cancelled() => {
                    return DeploymentError::Interrupted(self.shared.state.get());
                }
                _ = ticker.tick() => {}
            }

            let mut guard = self.shared.child.lock().await;
            let Some(handle) = guard.as_mut() else {
                return DeploymentError::Interrupted(self.shared.state.get());
            };
            match handle.poll_exit() {
                Ok(Some(status)) => {
                    return DeploymentError::ExitedEarly {
                        status: status.to_string(),
                    };
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to poll child status"),
            }
        }
    }

    /// Mark the deployment failed and make sure the child is gone.
    async fn abort_deploy(&self, err: DeploymentError) -> DeploymentError {
        if !self.shared.fail(err.to_string()) {
            // Shutdown took over and owns the child.
            return DeploymentError::Interrupted(self.shared.state.get());
        }

        let handle = self.shared.child.lock().await.take();
        if let Some(mut handle) = handle {
            match shutdown_child(handle.child_mut(), Duration::ZERO).await {
                Ok(termination) => debug!(
                    pid = handle.pid(),
                    status = %termination.status,
                    "Killed child after failed deployment"
                ),
                Err(e) => warn!(pid = handle.pid(), error = %e, "Failed to kill child"),
            }
        }
        err
    }

    fn advance(&self, to: DeploymentState) -> Result<(), DeploymentError> {
        self.shared
            .state
            .transition(to)
            .map(drop)
            .map_err(|e| DeploymentError::Interrupted(e.from))
    }

    async fn register(&self, endpoint: &Endpoint) {
        match self.registrar.register(endpoint, &self.catalog).await {
            Ok(receipt) => {
                self.shared
                    .registered
                    .store(receipt.acknowledged, Ordering::SeqCst);
                debug!(
                    submitted = receipt.submitted,
                    acknowledged = receipt.acknowledged,
                    "Registration complete"
                );
            }
            Err(e) => {
                warn!(error = %e, "Service registration failed, continuing without it");
            }
        }
    }

    fn spawn_monitors(&self) -> Monitors {
        let settings = &self.config.monitor;
        let token = self.shared.cancel_token.clone();

        Monitors {
            health: MonitorLoop::new("health", settings.health_interval(), token.clone())
                .spawn(HealthObserver::new(Arc::clone(&self.shared))),
            performance: MonitorLoop::new("performance", settings.performance_interval(), token)
                .spawn(PerformanceObserver::new(Arc::clone(&self.shared))),
        }
    }

    /// Cancel both loops and wait for them to finish.
    async fn stop_monitors(&self) {
        self.shared.cancel_token.cancel();
        let Some(monitors) = self.monitors.lock().await.take() else {
            return;
        };

        for (name, handle) in [
            ("health", monitors.health),
            ("performance", monitors.performance),
        ] {
            match handle.await {
                Ok(stats) => debug!(
                    monitor = name,
                    ticks = stats.ticks,
                    failures = stats.failures,
                    "Monitor joined"
                ),
                Err(e) => warn!(monitor = name, error = %e, "Monitor task panicked"),
            }
        }
    }

    /// Join leftover loops and reap a dead child after a terminal state.
    async fn release(&self) {
        self.stop_monitors().await;
        let handle = self.shared.child.lock().await.take();
        if let Some(mut handle) = handle {
            if let Err(e) = shutdown_child(handle.child_mut(), Duration::ZERO).await {
                warn!(pid = handle.pid(), error = %e, "Failed to reap child");
            }
        }
    }

    fn mark_stopped(&self) -> DeploymentState {
        if let Err(e) = self.shared.state.transition(DeploymentState::Stopped) {
            debug!(state = %e.from, "Deployment already finished");
        }
        self.state()
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        // Loops stop; the child is killed when its handle drops.
        self.shared.cancel_token.cancel();
    }
}
