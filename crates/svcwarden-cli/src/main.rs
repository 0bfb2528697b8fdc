//! CLI entry point - the composition root.
//!
//! Loads configuration, deploys the service host and keeps it supervised
//! until Ctrl-C or until the deployment ends on its own.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use svcwarden_cli::{Cli, UptimeSource};
use svcwarden_runtime::ProcessSupervisor;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first so they feed the flag defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.load_config()?;
    let supervisor = ProcessSupervisor::builder(config)
        .status_source(Arc::new(UptimeSource::new()))
        .build()?;

    if cli.check {
        let program = supervisor.preflight()?;
        println!("{}", program.display());
        return Ok(());
    }

    let grace = supervisor.config().grace_period();
    if let Err(e) = supervisor.deploy().await {
        error!(error = %e, "Deployment failed");
        return Err(e).context("Failed to deploy service host");
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupt received, shutting down");
        }
        state = supervisor.wait_terminal() => {
            warn!(%state, "Deployment ended without a shutdown request");
        }
    }

    let report = supervisor.shutdown(grace).await?;
    info!(
        state = %report.state,
        forced = report.forced,
        exit_code = ?report.exit_code,
        elapsed = ?report.elapsed,
        "Shutdown complete"
    );

    let status = supervisor.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
