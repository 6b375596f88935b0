//! External command execution with timeouts and line streaming.
//!
//! All subprocess access goes through [`CommandRunner`] so the parsers and
//! managers above it can be driven by canned output in tests.

use crate::error::AppError;
use futures::future::BoxFuture;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

pub const INXI_TIMEOUT: Duration = Duration::from_secs(90);
pub const PACKAGE_OP_TIMEOUT: Duration = Duration::from_secs(300);
/// AUR helper installs build from source.
pub const AUR_BUILD_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);
pub const DRIVERS_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DETECT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(20);
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const AUR_SEARCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const QUICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback receiving stdout lines as they arrive.
pub type LineSink = Box<dyn FnMut(&str) + Send>;

/// A command line plus its execution limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Force untranslated tool output so the regex parsers match.
    pub fn c_locale(self) -> Self {
        self.env("LC_ALL", "C").env("LANG", "C")
    }

    /// Wrap the whole command in pkexec.
    pub fn privileged(self) -> Self {
        let CommandSpec {
            program,
            mut args,
            timeout,
            env,
        } = self;
        args.insert(0, program);
        CommandSpec {
            program: "pkexec".to_string(),
            args,
            timeout,
            env,
        }
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit code for error messages, -1 when killed.
    pub fn code(&self) -> i32 {
        self.status.unwrap_or(-1)
    }

    /// Last non-empty stderr lines, for error dialogs.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let tail: Vec<&str> = self
            .stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = tail.len().saturating_sub(lines);
        tail[start..].join("\n")
    }
}

/// Subprocess seam. A non-zero exit is returned as output, not an error;
/// only spawn failures and timeouts are errors.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: CommandSpec) -> BoxFuture<'static, Result<CommandOutput, AppError>>;

    /// Like `run`, but hands each stdout line to `sink` as soon as it is read.
    fn run_streaming(
        &self,
        spec: CommandSpec,
        sink: LineSink,
    ) -> BoxFuture<'static, Result<CommandOutput, AppError>>;
}

/// Production runner on tokio::process.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }

    fn build(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        command
    }
}

fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> AppError {
    AppError::OsCommand {
        cmd: spec.display(),
        reason: e.to_string(),
    }
}

async fn with_timeout<F>(spec: &CommandSpec, fut: F) -> Result<CommandOutput, AppError>
where
    F: std::future::Future<Output = Result<CommandOutput, AppError>>,
{
    match spec.timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            log::warn!("[Command] '{}' timed out after {:?}", spec.display(), limit);
            AppError::Timeout {
                cmd: spec.display(),
                secs: limit.as_secs(),
            }
        })?,
        None => fut.await,
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: CommandSpec) -> BoxFuture<'static, Result<CommandOutput, AppError>> {
        Box::pin(async move {
            log::debug!("[Command] run: {}", spec.display());
            let mut command = Self::build(&spec);
            let fut = async {
                // kill_on_drop reaps the child if the timeout drops this future
                let output = command.output().await.map_err(|e| spawn_error(&spec, e))?;
                Ok(CommandOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            };
            with_timeout(&spec, fut).await
        })
    }

    fn run_streaming(
        &self,
        spec: CommandSpec,
        mut sink: LineSink,
    ) -> BoxFuture<'static, Result<CommandOutput, AppError>> {
        Box::pin(async move {
            log::debug!("[Command] stream: {}", spec.display());
            let mut command = Self::build(&spec);
            let fut = async {
                let mut child = command.spawn().map_err(|e| spawn_error(&spec, e))?;
                let stdout = child.stdout.take().ok_or_else(|| AppError::OsCommand {
                    cmd: spec.display(),
                    reason: "Failed to capture stdout".to_string(),
                })?;
                let mut stderr = child.stderr.take().ok_or_else(|| AppError::OsCommand {
                    cmd: spec.display(),
                    reason: "Failed to capture stderr".to_string(),
                })?;

                let stderr_task = tokio::spawn(async move {
                    let mut buf = String::new();
                    let _ = stderr.read_to_string(&mut buf).await;
                    buf
                });

                let mut collected = String::new();
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            sink(&line);
                            collected.push_str(&line);
                            collected.push('\n');
                        }
                        Ok(None) => break,
                        Err(e) => {
                            log::warn!("[Command] stdout read error from '{}': {}", spec.display(), e);
                            break;
                        }
                    }
                }

                let status = child.wait().await.map_err(|e| spawn_error(&spec, e))?;
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    status: status.code(),
                    stdout: collected,
                    stderr,
                })
            };
            with_timeout(&spec, fut).await
        })
    }
}

/// `which <name>`, treating any failure as absent.
pub async fn command_exists(runner: &dyn CommandRunner, name: &str) -> bool {
    let spec = CommandSpec::new("which").arg(name).timeout(QUICK_TIMEOUT);
    match runner.run(spec).await {
        Ok(output) => output.success(),
        Err(_) => false,
    }
}
