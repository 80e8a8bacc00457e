//! Detached launch and termination of the service process.
//!
//! The service is spawned into its own process group (or detached on
//! Windows) so it survives the client. Liveness checks and termination of
//! previously-adopted instances go through the pid, since those processes
//! were never our children.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::Result;

const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Spawns the service binary detached from the current process.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Launches the binary; the child keeps running if this process exits.
    pub fn launch(&self, binary: &Path) -> Result<Child> {
        let mut command = Command::new(binary);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        command.process_group(0);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            command.creation_flags(DETACHED_PROCESS);
        }

        let child = command.spawn()?;
        debug!(pid = child.id(), binary = %binary.display(), "service launched");
        Ok(child)
    }
}

/// True when a process with the given pid exists.
///
/// On non-Unix targets there is no cheap signal-0 probe, so this reports
/// `false` and callers fall back to the health endpoint.
pub fn pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 performs permission and existence checks only.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Gracefully stops our own child: term signal, bounded wait, then kill.
pub async fn terminate_child(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(status) => {
                status?;
                return Ok(());
            }
            Err(_) => warn!(pid, "service ignored term signal, killing"),
        }
    }

    child.kill().await?;
    Ok(())
}

/// Gracefully stops a process adopted from the run file.
///
/// Only possible on Unix; elsewhere the adopted instance is left alone and
/// the caller just forgets its record.
pub async fn terminate_pid(pid: u32) {
    #[cfg(unix)]
    {
        let pid = pid as libc::pid_t;
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
        let deadline = tokio::time::Instant::now() + TERMINATE_GRACE;
        while pid_alive(pid as u32) {
            if tokio::time::Instant::now() >= deadline {
                warn!(pid, "service ignored term signal, killing");
                unsafe {
                    libc::kill(pid, libc::SIGKILL);
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    #[cfg(not(unix))]
    {
        warn!(pid, "cannot terminate an adopted process on this platform");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_and_terminate_a_child() {
        let launcher = ProcessLauncher;
        let mut child = launcher.launch(Path::new("/bin/cat")).unwrap();
        let pid = child.id().unwrap();
        assert!(pid > 0);
        terminate_child(&mut child).await.unwrap();
    }

    #[test]
    fn dead_pid_is_not_alive() {
        // Pid near the typical pid_max; extremely unlikely to be running.
        assert!(!pid_alive(4_000_000));
    }

    #[tokio::test]
    async fn terminating_a_dead_pid_returns_quickly() {
        terminate_pid(4_000_000).await;
    }
}
