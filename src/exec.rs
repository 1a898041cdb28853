//! Runs approved commands through `sh -c` and reports what happened.
//!
//! The executor acts on a decision it is handed; it never evaluates rules
//! itself. Every outcome, including refusals and spawn failures, comes back
//! as an [`ExecutionResult`] rather than an error.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::eval::Decision;

/// Exit code reported when a command is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Answers "may this command run?" for `Ask` decisions.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, command: &str) -> bool;
}

#[async_trait]
impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn confirm(&self, command: &str) -> bool {
        self(command)
    }
}

/// Fixed answer, for tests and non-interactive use.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _command: &str) -> bool {
        self.0
    }
}

/// Prompts on stderr and reads a `y`/`n` answer from `R` (stdin by default).
///
/// One buffered reader lives for the whole session, so answers typed ahead
/// of a prompt are kept for the next one.
pub struct TerminalConfirm<R = tokio::io::Stdin> {
    input: Mutex<BufReader<R>>,
}

impl TerminalConfirm {
    pub fn new() -> Self {
        Self::with_input(tokio::io::stdin())
    }
}

impl Default for TerminalConfirm {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncRead + Unpin> TerminalConfirm<R> {
    pub fn with_input(input: R) -> Self {
        Self {
            input: Mutex::new(BufReader::new(input)),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Confirm for TerminalConfirm<R> {
    async fn confirm(&self, command: &str) -> bool {
        let mut stderr = tokio::io::stderr();
        let prompt = format!("\nAgent wants to run: {command}\nAllow this command? [y/N] ");
        if stderr.write_all(prompt.as_bytes()).await.is_err() {
            return false;
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Denied,
    DeniedByUser,
    TimedOut,
    SpawnFailed,
}

/// Outcome of one [`CommandExecutor::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub command: String,
    /// Captured stdout.
    pub output: String,
    /// Refusal reason, spawn error, or stderr of a failed command.
    pub error: Option<String>,
    pub exit_code: i32,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    fn refused(command: &str, status: ExecutionStatus, error: String) -> Self {
        Self {
            command: command.to_string(),
            output: String::new(),
            error: Some(error),
            exit_code: 1,
            status,
        }
    }

    /// The command ran and exited zero.
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Completed && self.exit_code == 0
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Spawns commands one at a time.
#[derive(Debug, Default)]
pub struct CommandExecutor {
    timeout: Option<Duration>,
    auto_approve: bool,
    serial: Mutex<()>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Treat `Ask` as already confirmed.
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    /// Act on `decision` for `command`.
    ///
    /// Concurrent calls on the same executor run one after another.
    /// Dropping the returned future kills a running child.
    pub async fn execute(
        &self,
        command: &str,
        decision: Decision,
        confirm: &dyn Confirm,
    ) -> ExecutionResult {
        if command.trim().is_empty() {
            return ExecutionResult::refused(
                command,
                ExecutionStatus::Denied,
                "empty command".into(),
            );
        }

        let _turn = self.serial.lock().await;

        match decision {
            Decision::Deny => {
                info!("refusing {command:?}: denied by rules");
                return ExecutionResult::refused(
                    command,
                    ExecutionStatus::Denied,
                    format!("command '{command}' is not allowed by permissions"),
                );
            }
            Decision::Ask if !self.auto_approve => {
                if !confirm.confirm(command).await {
                    info!("refusing {command:?}: user declined");
                    return ExecutionResult::refused(
                        command,
                        ExecutionStatus::DeniedByUser,
                        format!("command '{command}' was not approved by the user"),
                    );
                }
            }
            Decision::Ask | Decision::Approve => {}
        }

        self.spawn(command).await
    }

    async fn spawn(&self, command: &str) -> ExecutionResult {
        debug!("spawning {command:?}");
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("failed to spawn {command:?}: {err}");
                return ExecutionResult::refused(
                    command,
                    ExecutionStatus::SpawnFailed,
                    err.to_string(),
                );
            }
        };

        // Killed on timeout or when this future is dropped; `sh` leads the
        // group, so anything it forked goes with it.
        let mut group = GroupKill(child.id());

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("killed {command:?} after {limit:?}");
                    return ExecutionResult {
                        command: command.to_string(),
                        output: String::new(),
                        error: Some(format!("command timed out after {}s", limit.as_secs_f64())),
                        exit_code: TIMEOUT_EXIT_CODE,
                        status: ExecutionStatus::TimedOut,
                    };
                }
            },
            None => child.wait_with_output().await,
        };
        group.disarm();

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!("failed waiting on {command:?}: {err}");
                return ExecutionResult::refused(
                    command,
                    ExecutionStatus::SpawnFailed,
                    err.to_string(),
                );
            }
        };

        let exit_code = exit_code(&output.status);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("{command:?} exited with {exit_code}");

        ExecutionResult {
            command: command.to_string(),
            output: stdout,
            error: (exit_code != 0 && !stderr.is_empty()).then_some(stderr),
            exit_code,
            status: ExecutionStatus::Completed,
        }
    }
}

/// Kills the process group led by the held pid when dropped.
struct GroupKill(Option<u32>);

impl GroupKill {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        if let Some(pid) = self.0.take() {
            kill_group(pid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!("kill of process group {pgid} failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
