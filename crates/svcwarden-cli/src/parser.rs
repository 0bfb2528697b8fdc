//! Command-line parser and configuration assembly.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use svcwarden_core::{ChildCommand, ENV_LOG_LEVEL, ENV_MODE, SupervisorConfig};

/// Deploy and supervise a service host process.
///
/// Settings come from an optional JSON config file; flags and their
/// environment variables override individual values.
#[derive(Parser, Debug)]
#[command(name = "svcwarden")]
#[command(about = "Deploy, register and monitor a service host process")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "SVC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host the service listens on
    #[arg(long, env = "SVC_HOST")]
    pub host: Option<String>,

    /// Port the service listens on
    #[arg(short, long, env = "SVC_PORT")]
    pub port: Option<u16>,

    /// HTTP health path probed for readiness
    #[arg(long, conflicts_with = "tcp_probe")]
    pub health_path: Option<String>,

    /// Probe readiness with a plain TCP connect instead of HTTP
    #[arg(long)]
    pub tcp_probe: bool,

    /// Operating mode passed to the service
    #[arg(long, env = ENV_MODE)]
    pub mode: Option<String>,

    /// Log level passed to the service
    #[arg(long, env = ENV_LOG_LEVEL)]
    pub log_level: Option<String>,

    /// Shutdown grace period in milliseconds
    #[arg(long)]
    pub grace_ms: Option<u64>,

    /// Health check interval in milliseconds
    #[arg(long)]
    pub health_interval_ms: Option<u64>,

    /// Performance sampling interval in milliseconds
    #[arg(long)]
    pub performance_interval_ms: Option<u64>,

    /// Only check that the service program can be found
    #[arg(long)]
    pub check: bool,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Service program and its arguments
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Build the supervisor configuration from the file and overrides.
    pub fn load_config(&self) -> anyhow::Result<SupervisorConfig> {
        let mut config = match &self.config {
            Some(path) => read_config_file(path)?,
            None => SupervisorConfig::with_defaults(),
        };
        self.apply_overrides(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut SupervisorConfig) {
        if let Some((program, args)) = self.command.split_first() {
            // Keep environment and working dir from the file.
            config.command = ChildCommand {
                program: program.clone(),
                args: args.to_vec(),
                ..std::mem::take(&mut config.command)
            };
        }
        if let Some(host) = &self.host {
            config.endpoint.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if self.tcp_probe {
            config.endpoint.health_path = None;
        } else if let Some(path) = &self.health_path {
            config.endpoint.health_path = Some(path.clone());
        }
        if let Some(mode) = &self.mode {
            config.mode.clone_from(mode);
        }
        if let Some(level) = &self.log_level {
            config.child_log_level.clone_from(level);
        }
        if let Some(grace) = self.grace_ms {
            config.grace_period_ms = grace;
        }
        if let Some(interval) = self.health_interval_ms {
            config.monitor.health_interval_ms = interval;
        }
        if let Some(interval) = self.performance_interval_ms {
            config.monitor.performance_interval_ms = interval;
        }
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<SupervisorConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_trailing_command_replaces_program() {
        let cli = Cli::parse_from(["svcwarden", "--port", "4100", "--", "python3", "-m", "host"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.command.program, "python3");
        assert_eq!(config.command.args, vec!["-m", "host"]);
        assert_eq!(config.endpoint.port, 4100);
    }

    #[test]
    fn test_file_values_survive_unset_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"endpoint": {{"port": 4200}}, "command": {{"program": "node", "env": {{"A": "1"}}}}, "mode": "staging"}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::parse_from(["svcwarden", "--config", path, "--tcp-probe", "--", "deno"]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.endpoint.port, 4200);
        assert_eq!(config.mode, "staging");
        assert_eq!(config.endpoint.health_path, None);
        assert_eq!(config.command.program, "deno");
        assert_eq!(config.command.env.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let cli = Cli::parse_from(["svcwarden", "--health-interval-ms", "0"]);
        let err = cli.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("health_interval_ms"));
    }
}
