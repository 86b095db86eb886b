//! Builder for executing external tool commands with timeout support.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::ToolError;

/// Default command timeout: 30 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

/// A builder for constructing and executing one external tool invocation.
///
/// The child runs in its own process group with `kill_on_drop` set, so both a
/// timeout and dropping the returned future leave no process behind.
///
/// # Example
///
/// ```no_run
/// use streamforge_av::ToolCommand;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), streamforge_av::ToolError> {
/// let output = ToolCommand::new("mp4fragment")
///     .arg("/videos/7/42/video.mp4")
///     .arg("/tmp/fragmented.mp4")
///     .timeout(Duration::from_secs(600))
///     .execute()
///     .await?;
/// println!("{}", output.stderr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the tool from `dir` instead of the server's working directory.
    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short tool name for logs and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// The full command line, for debug logs only.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`ToolError::Spawn`] if the process could not be started.
    /// - [`ToolError::Timeout`] if the deadline passed; the process group has
    ///   been killed and reaped by the time this returns.
    /// - [`ToolError::Execution`] if the process exited unsuccessfully.
    /// - [`ToolError::Io`] if waiting on the process failed.
    pub async fn execute(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(tool = %tool, "Running: {}", self.command_line());

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = {
            let run = async {
                let (status, stdout, stderr) =
                    tokio::join!(child.wait(), drain(stdout), drain(stderr));
                status.map(|status| (status, stdout, stderr))
            };
            tokio::time::timeout(self.timeout, run).await
        };

        let (status, stdout, stderr) = match outcome {
            Ok(Ok(finished)) => finished,
            Ok(Err(source)) => {
                terminate(&mut child, &tool).await;
                return Err(ToolError::Io { tool, source });
            }
            Err(_elapsed) => {
                terminate(&mut child, &tool).await;
                tracing::warn!(tool = %tool, "Killed after {:?}", self.timeout);
                return Err(ToolError::Timeout {
                    tool,
                    after: self.timeout,
                });
            }
        };

        let elapsed = started.elapsed();
        tracing::debug!(
            tool = %tool,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Finished"
        );

        if !status.success() {
            return Err(ToolError::Execution {
                tool,
                exit_code: status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
            elapsed,
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        // A read error only truncates diagnostics.
        let _ = reader.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Kill the child's process group and reap the child.
async fn terminate(child: &mut Child, tool: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // The child leads its own group (process_group(0)), so pgid == pid.
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!(tool = %tool, "killpg failed: {}", e);
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!(tool = %tool, "start_kill failed: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(tool = %tool, "Failed to reap killed process: {}", e);
    }
}
