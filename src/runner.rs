//! Process execution core.
//!
//! Every external tool invocation goes through this module. The security
//! model is argv-style invocation only: arguments cross the trust boundary as
//! discrete [`OsString`] elements via [`CommandSpec`], never as shell strings,
//! so no `sh -c` evaluation can reinterpret caller data.
//!
//! Three execution modes:
//!
//! - [`run`]: capture mode, running to completion under a wall-clock
//!   deadline while buffering both streams up to a per-stream byte cap.
//! - [`run_with_stdin`]: streaming mode, additionally feeding a payload to
//!   the child's stdin (closing it immediately) and accumulating output as
//!   it arrives. Same observable contract: one complete result after the
//!   process has fully terminated.
//! - [`spawn_detached`]: start a long-lived background process in its own
//!   session, never waited on.
//!
//! The capture runners never fail: every outcome (success, nonzero exit,
//! spawn failure, timeout) is encoded in the returned [`ExecResult`].

use crate::buffer::CappedBuffer;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::debug;

/// Default wall-clock deadline for a captured execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default per-stream capture cap (10 MiB).
pub const DEFAULT_OUTPUT_CAP: usize = 10 * 1024 * 1024;

/// Fixed stderr marker reported for timed-out executions.
pub const TIMEOUT_MARKER: &str = "Command timed out";

/// How long to drain remaining pipe output after a forced termination.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Specification for a command to execute.
///
/// Arguments are stored as discrete `OsString` elements and passed to the OS
/// as an argument vector. Shell metacharacters in arguments are data, not
/// syntax.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute.
    pub program: OsString,
    /// Arguments as discrete elements (never shell strings).
    pub args: Vec<OsString>,
    /// Optional working directory.
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides, merged onto the inherited environment.
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` for the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment override (overrides win over the inherited value).
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Build a `tokio::process::Command` from this spec.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }
        cmd
    }

    /// Build a `std::process::Command` from this spec (detached launches).
    #[must_use]
    pub fn to_std_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }
        cmd
    }
}

/// Per-invocation execution options.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Wall-clock deadline; on expiry the process is forcibly terminated.
    pub timeout: Duration,
    /// Per-stream capture cap in bytes; excess output is discarded.
    pub output_cap: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            output_cap: DEFAULT_OUTPUT_CAP,
        }
    }
}

impl ExecOptions {
    /// Options with a specific deadline and the default output cap.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Byte-level outcome of a captured execution.
///
/// Used directly only where the raw bytes matter (binary captures such as
/// screenshots); everything else goes through [`ExecResult`].
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code; `None` if the process was terminated or never spawned.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl RawOutput {
    fn spawn_failure(message: String) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: message.into_bytes(),
            exit_code: None,
            timed_out: false,
        }
    }

    /// Whether the process exited cleanly (code 0, no timeout).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// Stderr as text, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Text-level outcome of a captured execution.
///
/// Invariants: `timed_out` implies `!success` and `exit_code == None`;
/// `success` implies `exit_code == Some(0)` and `!timed_out`.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecResult {
    fn from_raw(raw: RawOutput) -> Self {
        let success = raw.success();
        let stderr = if raw.timed_out {
            // Timeout is never reported as an ordinary failure; partial
            // stderr is replaced by the fixed marker.
            TIMEOUT_MARKER.to_string()
        } else {
            String::from_utf8_lossy(&raw.stderr).into_owned()
        };
        Self {
            success,
            stdout: String::from_utf8_lossy(&raw.stdout).into_owned(),
            stderr,
            exit_code: raw.exit_code,
            timed_out: raw.timed_out,
        }
    }
}

/// Run a command to completion in capture mode.
///
/// Never fails; every outcome is encoded in the result: exit 0 → success;
/// nonzero exit → failure with that code; spawn failure → failure with
/// `exit_code: None` and the spawn error on stderr; deadline expiry → forced
/// termination with `timed_out: true`.
pub async fn run(spec: &CommandSpec, opts: &ExecOptions) -> ExecResult {
    ExecResult::from_raw(run_raw(spec, opts).await)
}

/// Capture-mode execution returning raw bytes.
pub async fn run_raw(spec: &CommandSpec, opts: &ExecOptions) -> RawOutput {
    debug!(program = %spec.program.to_string_lossy(), args = spec.args.len(), "spawning process");
    let mut command = spec.to_tokio_command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return RawOutput::spawn_failure(format!(
                "Failed to spawn process '{}': {e}",
                spec.program.to_string_lossy()
            ));
        }
    };
    capture(&mut child, None, opts).await
}

/// Run a command in streaming mode, feeding `input` to its stdin.
///
/// The full payload is written and the input channel closed immediately; no
/// duplex negotiation. Same result shape and timeout policy as [`run`].
pub async fn run_with_stdin(spec: &CommandSpec, input: &str, opts: &ExecOptions) -> ExecResult {
    debug!(program = %spec.program.to_string_lossy(), "spawning process with stdin payload");
    let mut command = spec.to_tokio_command();
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ExecResult::from_raw(RawOutput::spawn_failure(format!(
                "Failed to spawn process '{}': {e}",
                spec.program.to_string_lossy()
            )));
        }
    };
    ExecResult::from_raw(capture(&mut child, Some(input), opts).await)
}

/// Start a detached background process and return its PID.
///
/// Stdio is not attached and, on Unix, the child is placed in a new session
/// so this server's own shutdown does not terminate it. The process is never
/// waited on; readiness polling is a caller-level concern.
pub fn spawn_detached(spec: &CommandSpec) -> std::io::Result<u32> {
    debug!(program = %spec.program.to_string_lossy(), "spawning detached process");
    let mut command = spec.to_std_command();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // SAFETY: setsid is async-signal-safe and runs in the child only.
        unsafe {
            command.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    let child = command.spawn()?;
    Ok(child.id())
}

/// Drive a spawned child to a classified outcome.
///
/// Handles the optional stdin payload, concurrent capped capture of both
/// streams, the wall-clock deadline, forced termination, and a short
/// post-kill drain. Buffers, pipes, and the process handle are all scoped to
/// this call and released on every exit path.
async fn capture(child: &mut Child, input: Option<&str>, opts: &ExecOptions) -> RawOutput {
    let stdin_handle = child.stdin.take();

    let Some(mut stdout_pipe) = child.stdout.take() else {
        return RawOutput::spawn_failure("Failed to capture stdout".to_string());
    };
    let Some(mut stderr_pipe) = child.stderr.take() else {
        return RawOutput::spawn_failure("Failed to capture stderr".to_string());
    };

    let mut stdout_buf = CappedBuffer::new(opts.output_cap);
    let mut stderr_buf = CappedBuffer::new(opts.output_cap);

    // The payload is written concurrently with output capture so a child
    // that fills its output pipe before reading stdin cannot wedge the call;
    // dropping the handle closes the channel immediately after the write.
    let write_stdin = async {
        if let (Some(mut stdin), Some(payload)) = (stdin_handle, input) {
            // The tool may exit before consuming the whole payload (e.g. a
            // license prompt answered on the first line); not a fault.
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
        }
        Ok(())
    };

    let wait_for_exit = async {
        let (write_result, read_result) = tokio::join!(
            write_stdin,
            read_streams(
                &mut stdout_pipe,
                &mut stderr_pipe,
                &mut stdout_buf,
                &mut stderr_buf,
            )
        );
        write_result?;
        read_result?;
        child.wait().await
    };
    // Bind before matching so the future (and its borrows) is dropped here.
    let outcome = timeout(opts.timeout, wait_for_exit).await;

    let status = match outcome {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return RawOutput::spawn_failure(format!("Failed to read process output: {e}"));
        }
        Err(_) => None,
    };

    match status {
        Some(status) => RawOutput {
            stdout: stdout_buf.into_bytes(),
            stderr: stderr_buf.into_bytes(),
            exit_code: status.code(),
            timed_out: false,
        },
        None => {
            // Deadline expired: terminate, reap, and drain briefly so partial
            // output is still observable in the raw result.
            let _ = child.start_kill();
            let _ = child.wait().await;
            let _ = timeout(
                DRAIN_TIMEOUT,
                read_streams(
                    &mut stdout_pipe,
                    &mut stderr_pipe,
                    &mut stdout_buf,
                    &mut stderr_buf,
                ),
            )
            .await;
            RawOutput {
                stdout: stdout_buf.into_bytes(),
                stderr: stderr_buf.into_bytes(),
                exit_code: None,
                timed_out: true,
            }
        }
    }
}

/// Read both pipes to EOF, writing into the capped buffers as data arrives.
async fn read_streams(
    stdout_pipe: &mut ChildStdout,
    stderr_pipe: &mut ChildStderr,
    stdout_buf: &mut CappedBuffer,
    stderr_buf: &mut CappedBuffer,
) -> std::io::Result<()> {
    let mut out_chunk = vec![0u8; 8192];
    let mut err_chunk = vec![0u8; 8192];
    let mut out_done = false;
    let mut err_done = false;

    while !(out_done && err_done) {
        tokio::select! {
            read = stdout_pipe.read(&mut out_chunk), if !out_done => match read? {
                0 => out_done = true,
                n => stdout_buf.write(&out_chunk[..n]),
            },
            read = stderr_pipe.read(&mut err_chunk), if !err_done => match read? {
                0 => err_done = true,
                n => stderr_buf.write(&err_chunk[..n]),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_preserves_metacharacters_as_data() {
        let cmd = CommandSpec::new("echo")
            .arg("hello; rm -rf /")
            .arg("$(whoami)")
            .arg("`ls`")
            .arg("foo | bar")
            .arg("foo && bar");

        assert_eq!(cmd.args.len(), 5);
        assert_eq!(cmd.args[0], OsString::from("hello; rm -rf /"));
        assert_eq!(cmd.args[1], OsString::from("$(whoami)"));

        let debug_str = format!("{:?}", cmd.to_tokio_command());
        assert!(debug_str.contains("hello; rm -rf /"));
    }

    #[test]
    fn command_spec_builder_accumulates() {
        let cmd = CommandSpec::new("adb")
            .args(["-s", "emulator-5554"])
            .arg("shell")
            .cwd("/tmp")
            .env("ANDROID_HOME", "/sdk");

        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
        assert_eq!(
            cmd.env.as_ref().unwrap().get(&OsString::from("ANDROID_HOME")),
            Some(&OsString::from("/sdk"))
        );
    }

    #[test]
    fn from_raw_classifies_success() {
        let result = ExecResult::from_raw(RawOutput {
            stdout: b"ok".to_vec(),
            stderr: Vec::new(),
            exit_code: Some(0),
            timed_out: false,
        });
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
    }

    #[test]
    fn from_raw_classifies_nonzero_exit() {
        let result = ExecResult::from_raw(RawOutput {
            stdout: Vec::new(),
            stderr: b"boom".to_vec(),
            exit_code: Some(2),
            timed_out: false,
        });
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(result.stderr, "boom");
    }

    #[test]
    fn from_raw_replaces_stderr_on_timeout() {
        let result = ExecResult::from_raw(RawOutput {
            stdout: b"partial".to_vec(),
            stderr: b"half a line".to_vec(),
            exit_code: None,
            timed_out: true,
        });
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.stderr, TIMEOUT_MARKER);
        assert_eq!(result.stdout, "partial");
    }
}
