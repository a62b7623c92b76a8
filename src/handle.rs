//! The process handle: spawn a shell child and supervise it without blocking
//!
//! A [`ProcessHandle`] owns one child process and three background workers:
//! a drain task per output stream moving lines into shared buffers, and an
//! exit-wait task recording the exit status. The caller-facing surface never
//! blocks on process I/O; all blocking happens inside the workers.

use crate::buffer::LineBuffer;
use crate::cleanup;
use crate::command::CommandLine;
use crate::config::SpawnOptions;
use crate::error::{Result, TetherError};
use crate::process::unix;
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Spawn `command` through the shell with default options
///
/// The command is either a complete shell string or a list of tokens joined
/// with single spaces. Returns as soon as the process is created; output
/// collection and exit tracking continue in the background. Must be called
/// from within a tokio runtime.
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> tether::Result<()> {
/// let mut handle = tether::spawn("sh")?;
/// handle.write_line("echo hello").await?;
/// // ...poll handle.read_output() whenever convenient...
/// handle.terminate();
/// # Ok(())
/// # }
/// ```
pub fn spawn(command: impl Into<CommandLine>) -> Result<ProcessHandle> {
    ProcessHandle::spawn_with(command, SpawnOptions::default())
}

/// A supervised child process with non-blocking I/O queues
///
/// The handle stays usable after the child exits on its own: buffered output
/// remains readable and [`exit_code`](ProcessHandle::exit_code) reports the
/// status. [`terminate`](ProcessHandle::terminate) closes the handle and
/// kills the child's entire process tree; a handle dropped without
/// terminating falls back to the same teardown on a best-effort basis, and
/// the program-exit hook covers whatever remains.
pub struct ProcessHandle {
    command: String,
    pid: Pid,
    verbose: bool,
    stdin: Option<ChildStdin>,
    stdout_lines: LineBuffer,
    stderr_lines: LineBuffer,
    exit_status: Arc<OnceLock<i32>>,
    stop_flag: Arc<AtomicBool>,
    stdout_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    wait_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ProcessHandle {
    /// Spawn `command` with explicit [`SpawnOptions`]
    ///
    /// Fails with [`TetherError::InvalidCommand`] for degenerate input (no
    /// process is created) or [`TetherError::Spawn`] when the OS rejects the
    /// process creation. On success all three workers are already running.
    pub fn spawn_with(
        command: impl Into<CommandLine>,
        options: SpawnOptions,
    ) -> Result<ProcessHandle> {
        let command = command.into();
        command.validate()?;
        let command = command.shell_string();

        let mut child = unix::spawn_shell(&command, options.environment.as_ref())?;
        let raw_pid = child.id().ok_or_else(|| {
            TetherError::Spawn("Spawned child did not report a PID".to_string())
        })?;
        let pid = Pid::from_raw(raw_pid as i32);

        if options.verbose {
            info!("Spawned `{}` as process group {}", command, pid);
        } else {
            debug!("Spawned `{}` as process group {}", command, pid);
        }

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_lines = LineBuffer::new();
        let stderr_lines = LineBuffer::new();
        let stop_flag = Arc::new(AtomicBool::new(false));

        let stdout_task = stdout.map(|stream| {
            spawn_drain(stream, stdout_lines.clone(), stop_flag.clone(), "stdout")
        });
        let stderr_task = stderr.map(|stream| {
            spawn_drain(stream, stderr_lines.clone(), stop_flag.clone(), "stderr")
        });

        let exit_status = Arc::new(OnceLock::new());
        let wait_task = Some(spawn_exit_wait(child, raw_pid, exit_status.clone()));

        cleanup::register(pid);

        Ok(ProcessHandle {
            command,
            pid,
            verbose: options.verbose,
            stdin,
            stdout_lines,
            stderr_lines,
            exit_status,
            stop_flag,
            stdout_task,
            stderr_task,
            wait_task,
            closed: false,
        })
    }

    /// The exact shell command string the child was started with
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The child's process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// The child's process group ID (same as the PID for session leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Append `text` verbatim to the child's standard input
    ///
    /// The write is flushed immediately so no bytes linger in a userspace
    /// buffer across the process boundary. The child may still need a
    /// trailing newline before it consumes the input; see
    /// [`write_line`](ProcessHandle::write_line).
    ///
    /// Fails with [`TetherError::Write`] when the handle is closed or the
    /// child's stdin is gone.
    pub async fn write(&mut self, text: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            TetherError::Write("Handle has no live process".to_string())
        })?;

        stdin.write_all(text.as_bytes()).await.map_err(|e| {
            TetherError::Write(format!("Failed to write to child stdin: {}", e))
        })?;
        stdin.flush().await.map_err(|e| {
            TetherError::Write(format!("Failed to flush child stdin: {}", e))
        })?;
        Ok(())
    }

    /// Like [`write`](ProcessHandle::write), but appends a newline
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        self.write(&format!("{}\n", text)).await
    }

    /// Drain every stdout line collected so far, oldest first
    ///
    /// Non-blocking: returns only lines already moved into the buffer, and
    /// an empty vector when nothing is available or the handle is closed.
    /// Lines are consumed destructively and not re-delivered.
    pub fn read_output(&self) -> Vec<String> {
        if self.closed {
            return Vec::new();
        }
        self.stdout_lines.drain()
    }

    /// Drain every stderr line collected so far, oldest first
    pub fn read_error(&self) -> Vec<String> {
        if self.closed {
            return Vec::new();
        }
        self.stderr_lines.drain()
    }

    /// Whether the child is still running
    ///
    /// True until the exit-wait worker records a status or the handle is
    /// closed; once false it never becomes true again.
    pub fn is_running(&self) -> bool {
        !self.closed && self.exit_status.get().is_none()
    }

    /// The child's recorded exit status, if it has finished
    ///
    /// A child killed by a signal reports the negated signal number (e.g.
    /// `-9` after SIGKILL).
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.get().copied()
    }

    /// Kill the child and its whole process tree, then close the handle
    ///
    /// Descendants are killed before the child itself, with the process
    /// group signalled as a backstop; failures to reach targets that already
    /// exited are tolerated per target. Idempotent: a second call is a
    /// no-op. The exit-wait worker is left running so the final status is
    /// still recorded and the child reaped.
    pub fn terminate(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop_flag.store(true, Ordering::Relaxed);

        unix::kill_tree(self.pid);

        // A drain worker parked on a read never observes the stop flag, so
        // abort both tasks outright; the waiter is disowned, not cancelled.
        if let Some(task) = self.stdout_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        let _ = self.wait_task.take();

        self.stdin = None;
        cleanup::unregister(self.pid);

        if self.verbose {
            info!("Closed handle for process group {}", self.pid);
        } else {
            debug!("Closed handle for process group {}", self.pid);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Drop timing is not guaranteed to help a crashing program; explicit
        // terminate() and the program-exit hook are the real cleanup paths.
        if !self.closed {
            self.terminate();
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .field("closed", &self.closed)
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

/// Move lines from one child output stream into `buffer` until the stream
/// ends or the stop flag is observed between reads
fn spawn_drain<R>(
    stream: R,
    buffer: LineBuffer,
    stop_flag: Arc<AtomicBool>,
    stream_name: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    // already without trailing newline
                    buffer.push(line);
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Ok(None) => {
                    // EOF
                    break;
                }
                Err(e) => {
                    debug!("Error reading child {}: {}", stream_name, e);
                    break;
                }
            }
        }
    })
}

/// Wait for the child to terminate and record its status exactly once
fn spawn_exit_wait(
    mut child: Child,
    raw_pid: u32,
    exit_status: Arc<OnceLock<i32>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                let code = status.code().or_else(|| {
                    use std::os::unix::process::ExitStatusExt;
                    status.signal().map(|signal| -signal)
                });
                if let Some(code) = code {
                    debug!("Child {} exited with status {}", raw_pid, code);
                    let _ = exit_status.set(code);
                }
            }
            Err(e) => {
                // No OS confirmation of termination; leave the status unset.
                error!("Failed to wait for child {}: {}", raw_pid, e);
            }
        }
    })
}
