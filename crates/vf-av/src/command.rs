//! Builder for executing external tool commands with timeout support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use vf_core::Error;

/// Default command timeout: 10 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 40;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// The last lines of standard error.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is spawned with `kill_on_drop`, so a timeout or a dropped
/// future never leaves a transcoder running.
///
/// # Example
///
/// ```no_run
/// use vf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> vf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
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

    /// The argument vector as it will be passed to the program.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and the tail of stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the process outlives the timeout.
    /// - [`Error::Tool`] if spawning fails or the process exits non-zero
    ///   (message includes the stderr tail).
    pub async fn execute(&self) -> vf_core::Result<ToolOutput> {
        self.execute_with_stderr_callback(|_| {}).await
    }

    /// Execute the command, handing every stderr line to `on_line` as it
    /// arrives.
    ///
    /// ffmpeg writes `-progress pipe:2` blocks and its input banner to
    /// stderr, so this is how callers observe encode progress. Dropping the
    /// returned future kills the child.
    pub async fn execute_with_stderr_callback<F>(
        &self,
        mut on_line: F,
    ) -> vf_core::Result<ToolOutput>
    where
        F: FnMut(&str),
    {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %program_name, args = ?self.args, "spawning");

        let mut child = cmd.spawn().map_err(|e| Error::Tool {
            tool: program_name.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

        let mut stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stdout concurrently so a chatty child never blocks on a
        // full pipe while we read stderr.
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(ref mut out) = stdout {
                let _ = out.read_to_end(&mut buf).await;
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let run = async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Some(line) = lines.next_line().await? {
                    on_line(&line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, tail))
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok((status, tail))) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = Vec::from(tail).join("\n");

                if !status.success() {
                    return Err(Error::Tool {
                        tool: program_name,
                        message: format!("exited with status {status}: {}", stderr.trim()),
                    });
                }

                Ok(ToolOutput {
                    status,
                    stdout,
                    stderr,
                })
            }
            Ok(Err(e)) => Err(Error::Tool {
                tool: program_name,
                message: format!("I/O error waiting for process: {e}"),
            }),
            Err(_elapsed) => {
                // The child is owned by this frame and spawned with
                // kill_on_drop, so returning here kills it.
                stdout_task.abort();
                tracing::warn!(tool = %program_name, "timed out after {:?}", self.timeout);
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}
