//! Unix process management with safe spawn/kill using process groups
//!
//! This module spawns shell children in their own process group (via
//! `setsid()`) and tears the whole tree down again when the handle is
//! terminated.
//!
//! ## Process Groups
//!
//! When a process calls `setsid()`, it:
//! - Creates a new session and becomes the session leader
//! - Creates a new process group and becomes the process group leader
//! - Has no controlling terminal
//!
//! Because the command runs through the shell, the immediate child routinely
//! forks further children (pipelines, background jobs). All of them share the
//! new process group, so one `killpg` can target the whole tree.
//!
//! ## Teardown
//!
//! [`kill_tree`] first enumerates the live descendants of the child from the
//! system process table and kills them individually, deepest first, then
//! kills the child, then signals the process group as a backstop for anything
//! forked between the enumeration and the signals. During teardown the
//! targets are racing to exit, so delivery failures (`ESRCH`, `EPERM`) are
//! treated as success for every step.

// Allow unsafe code for this module since process management requires libc::setsid() calls
#![allow(unsafe_code)]

use crate::error::{Result, TetherError};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::process::Stdio;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, RefreshKind, System};
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// Spawn `command` through `sh -c` in a new process group
///
/// Standard input, output, and error are all redirected to pipes owned by the
/// caller. The child inherits the caller's environment unless `environment`
/// is supplied, in which case the supplied map replaces it entirely.
///
/// ## Safety
///
/// This function uses `unsafe` code to call `libc::setsid()` in the
/// `pre_exec` closure. The safety is ensured because:
/// - `setsid()` is called in the child process before `exec()`
/// - `setsid()` is async-signal-safe and appropriate for use in `pre_exec`
/// - Error handling properly converts C errors to Rust errors
///
/// ## Example
///
/// ```rust,no_run
/// use tether::process::unix::spawn_shell;
///
/// let child = spawn_shell("echo hello | tr a-z A-Z", None)?;
/// # Ok::<(), tether::TetherError>(())
/// ```
pub fn spawn_shell(
    command: &str,
    environment: Option<&HashMap<String, String>>,
) -> Result<Child> {
    debug!("Spawning shell command: {}", command);

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(env) = environment {
        cmd.env_clear();
        cmd.envs(env);
    }

    // Use pre_exec to call setsid() in the child process
    // Safety: setsid() is async-signal-safe and appropriate for use in pre_exec
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        cmd.pre_exec(|| {
            // Create a new session and process group
            let result = libc::setsid();
            if result == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    cmd.spawn().map_err(|e| {
        error!("Failed to spawn `{}`: {}", command, e);
        TetherError::Spawn(format!("Failed to spawn `{}`: {}", command, e))
    })
}

/// Send SIGKILL to the process group rooted at `pgid`
///
/// `ESRCH` (no such process group) and `EPERM` (group already exited and was
/// replaced) are treated as success; the group being gone is the desired
/// outcome.
pub fn signal_kill_group(pgid: Pid) -> Result<()> {
    debug!("Sending SIGKILL to process group {}", pgid);

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", pgid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                pgid
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to send SIGKILL to process group {}: {}", pgid, e);
            Err(TetherError::Signal(format!(
                "Failed to send SIGKILL to process group {}: {}",
                pgid, e
            )))
        }
    }
}

/// Send SIGKILL to a single process, tolerating its prior exit
fn signal_kill(pid: Pid) {
    match kill(pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) | Err(nix::errno::Errno::EPERM) => {
            debug!("Process {} already exited", pid);
        }
        Err(e) => {
            // Teardown continues regardless; the group backstop follows.
            debug!("Failed to send SIGKILL to process {}: {}", pid, e);
        }
    }
}

/// Kill `pid` and every process descended from it
///
/// Descendants are enumerated recursively from the system process table and
/// killed deepest-first, then the process itself, then its process group.
/// Each kill is independent: a target that already exited never prevents the
/// remaining kills from being attempted.
pub fn kill_tree(pid: Pid) {
    let sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new()),
    );
    let root = SysPid::from_u32(pid.as_raw() as u32);
    let tree = collect_tree(&sys, root);

    debug!(
        "Killing process {} and {} live descendant(s)",
        pid,
        tree.len() - 1
    );

    // Breadth-first discovery puts the deepest processes last; kill them
    // before their parents so nothing re-parents mid-teardown.
    for victim in tree.iter().skip(1).rev() {
        if let Some(process) = sys.process(*victim) {
            if !process.kill() {
                debug!("Descendant {} was already gone", victim);
            }
        }
    }

    signal_kill(pid);

    if let Err(e) = signal_kill_group(pid) {
        debug!("Process-group backstop for {} failed: {}", pid, e);
    }
}

/// Collect `root` plus all its live descendants, breadth-first
fn collect_tree(sys: &System, root: SysPid) -> Vec<SysPid> {
    let mut tree = vec![root];
    let mut index = 0;
    while index < tree.len() {
        let parent = tree[index];
        for (pid, process) in sys.processes() {
            if process.parent() == Some(parent) {
                tree.push(*pid);
            }
        }
        index += 1;
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_shell_reports_pid() {
        let child = spawn_shell("echo hello", None).expect("Failed to spawn echo");
        assert!(child.id().unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn test_spawned_child_leads_its_own_group() {
        let mut child = spawn_shell("sleep 5", None).expect("Failed to spawn sleep");
        let pid = child.id().expect("child should have a pid") as i32;

        // setsid() runs in the child before exec; give it a moment to happen.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let child_pgid = unsafe { libc::getpgid(pid) };
        let own_pgid = unsafe { libc::getpgrp() };
        assert_eq!(child_pgid, pid);
        assert_ne!(child_pgid, own_pgid);

        signal_kill_group(Pid::from_raw(pid)).expect("Failed to kill group");
        let _ = child.wait().await;
    }

    #[tokio::test]
    async fn test_signal_kill_group_nonexistent_is_ok() {
        // A PID far above any live process; ESRCH is treated as success.
        let result = signal_kill_group(Pid::from_raw(9_999_999));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_kill_tree_tolerates_exited_process() {
        let mut child = spawn_shell("true", None).expect("Failed to spawn true");
        let pid = child.id().expect("child should have a pid") as i32;
        let _ = child.wait().await;

        // Everything is already gone; the teardown must stay silent.
        kill_tree(Pid::from_raw(pid));
    }

    #[tokio::test]
    async fn test_kill_tree_stops_a_sleeper() {
        let mut child = spawn_shell("sleep 30", None).expect("Failed to spawn sleep");
        let pid = child.id().expect("child should have a pid") as i32;
        tokio::time::sleep(Duration::from_millis(100)).await;

        kill_tree(Pid::from_raw(pid));

        let status = child.wait().await.expect("Failed to wait for child");
        assert!(!status.success());
    }
}
