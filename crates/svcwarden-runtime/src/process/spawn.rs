//! Command building and output capture for the supervised child.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use svcwarden_core::{ChildCommand, ChildLogSink, ChildStream, SpawnError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::ProcessHandle;

/// Resolve the configured program to an executable path.
///
/// Names are looked up on `PATH`; anything containing a path separator is
/// checked directly.
pub fn resolve_program(program: &str) -> Result<PathBuf, SpawnError> {
    which::which(program).map_err(|e| {
        debug!(program, error = %e, "Program resolution failed");
        SpawnError::ProgramNotFound {
            program: program.to_string(),
        }
    })
}

/// Spawn the child with piped stdout/stderr.
///
/// Output lines are logged via tracing and forwarded to `log_sink`. The
/// reader tasks exit when the streams close.
pub fn spawn_child(
    command: &ChildCommand,
    env: &BTreeMap<String, String>,
    log_sink: Arc<dyn ChildLogSink>,
) -> Result<ProcessHandle, SpawnError> {
    let program = resolve_program(&command.program)?;

    let mut cmd = Command::new(&program);
    cmd.args(&command.args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| SpawnError::Io {
        program: command.program.clone(),
        source,
    })?;
    let pid = child.id().ok_or(SpawnError::MissingPid)?;

    if let Some(stdout) = child.stdout.take() {
        spawn_log_reader(stdout, ChildStream::Stdout, pid, Arc::clone(&log_sink));
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_log_reader(stderr, ChildStream::Stderr, pid, log_sink);
    }

    info!(pid, program = %program.display(), args = ?command.args, "Spawned child process");
    Ok(ProcessHandle::new(child, pid))
}

fn spawn_log_reader<R>(reader: R, stream: ChildStream, pid: u32, sink: Arc<dyn ChildLogSink>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(text)) = lines.next_line().await {
            debug!(pid, %stream, "{}", text);
            sink.append(stream, text);
        }
        debug!(pid, %stream, "Output reader exiting");
    });
}
