//! Graceful shutdown for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub status: ExitStatus,
    /// The grace period expired and the child was killed.
    pub forced: bool,
}

/// Shut down a child process, escalating to SIGKILL after `grace`.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for the child to exit
/// 2. If still running, send SIGKILL
/// 3. Wait for reaping (required to avoid zombies)
///
/// A zero grace period skips SIGTERM and kills immediately.
/// On non-unix platforms the child is always killed immediately.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<Termination> {
    if let Some(status) = child.try_wait()? {
        debug!(?status, "Child already exited");
        return Ok(Termination {
            status,
            forced: false,
        });
    }

    #[cfg(unix)]
    if !grace.is_zero() {
        if let Some(status) = terminate_unix(child, grace).await? {
            return Ok(Termination {
                status,
                forced: false,
            });
        }
        warn!(
            ?grace,
            "Child ignored SIGTERM within grace period, killing"
        );
    }

    // Child::kill sends SIGKILL on unix and waits for the exit.
    child.kill().await?;
    let status = child.wait().await?;
    Ok(Termination {
        status,
        forced: true,
    })
}

/// Send SIGTERM and wait out the grace period. `None` means still running.
#[cfg(unix)]
async fn terminate_unix(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(pid) = child.id() else {
        // Already reaped by tokio.
        return child.wait().await.map(Some);
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        // Process may have already exited
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await.map(Some);
        }
        return Err(io::Error::other(e));
    }

    match timeout(grace, child.wait()).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;
    use tokio::time::sleep;

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let termination = shutdown_child(&mut child, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!termination.forced);
        assert!(!termination.status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_forces_kill_after_grace() {
        // The trap is inherited across exec, so `sleep` ignores SIGTERM.
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .expect("failed to spawn sh");
        sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let termination = shutdown_child(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(termination.forced);
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(250), "{elapsed:?}");
    }

    #[tokio::test]
    async fn shutdown_handles_already_exited() {
        let mut child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("failed to spawn echo");

        // Give it time to exit
        sleep(Duration::from_millis(100)).await;

        let termination = shutdown_child(&mut child, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!termination.forced);
        assert!(termination.status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn zero_grace_kills_immediately() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let termination = shutdown_child(&mut child, Duration::ZERO).await.unwrap();
        assert!(termination.forced);
    }
}
