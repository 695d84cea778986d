//! # Command Execution Module
//!
//! The `Executor` seam used by every stage, and `SystemExecutor`, the
//! implementation that spawns real processes with tokio.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    core::{
        error::ExecError,
        models::{CommandResult, CommandSpec},
    },
    reporting::console::Console,
};

/// How long to keep draining pipes once the child has exited or was killed.
/// A grandchild that inherited a pipe can otherwise hold it open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs one external command to completion.
///
/// A non-zero exit is a normal `Ok` result; only "could not run", "ran too
/// long" and "was cancelled" are errors.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` and waits for it to finish.
    ///
    /// # Arguments
    ///
    /// * `command` - The argv, working directory, capture mode and optional
    ///   timeout to run with.
    ///
    /// # Returns
    ///
    /// The exit code and, for captured commands, the decoded stdout and stderr.
    /// A non-zero exit is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// * `ExecError::NotFound` - the program could not be located.
    /// * `ExecError::TimedOut` - the timeout elapsed; carries the partial output.
    /// * `ExecError::Interrupted` - the run was cancelled.
    /// * `ExecError::Launch` - the operating system refused to start the process.
    async fn execute(&self, command: &CommandSpec) -> Result<CommandResult, ExecError>;
}

/// Spawns processes relative to an explicit base directory and looks programs
/// up on an explicit search path.
pub struct SystemExecutor {
    base_dir: PathBuf,
    search_path: Option<OsString>,
    console: Console,
    cancel: CancellationToken,
}

impl SystemExecutor {
    /// Uses the `PATH` of the current process as the search list.
    pub fn new(base_dir: impl Into<PathBuf>, console: Console) -> Self {
        Self {
            base_dir: base_dir.into(),
            search_path: std::env::var_os("PATH"),
            console,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the search list used to resolve bare program names.
    pub fn with_search_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(Into::into).collect();
        self.search_path = std::env::join_paths(dirs).ok();
        self
    }

    /// Kills the running child and fails the command when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Maps a program name to an executable path, or `None` if it does not exist.
    /// Names with a path component are taken relative to the base directory;
    /// bare names are looked up on the search list.
    pub fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.is_empty() {
            return None;
        }
        let path = Path::new(program);
        if path.is_absolute() || path.components().count() > 1 {
            let candidate = self.base_dir.join(path);
            return candidate.is_file().then_some(candidate);
        }
        which::which_in(program, self.search_path.as_ref(), &self.base_dir).ok()
    }

    fn working_dir(&self, command: &CommandSpec) -> PathBuf {
        match command.cwd() {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        }
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

#[async_trait]
impl Executor for SystemExecutor {
    async fn execute(&self, command: &CommandSpec) -> Result<CommandResult, ExecError> {
        let display = command.display();
        if !command.is_quiet() {
            self.console.running(&display);
        }

        let program = self.locate(command.program()).ok_or_else(|| {
            if !command.is_quiet() {
                self.console.failure(&format!("Command not found: {}", command.program()));
            }
            ExecError::NotFound {
                program: command.program().to_string(),
            }
        })?;

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(command.args())
            .current_dir(self.working_dir(command))
            .kill_on_drop(true);
        if command.is_captured() {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        debug!(program = %program.display(), cwd = ?command.cwd(), "spawning");
        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ExecError::NotFound {
                    program: command.program().to_string(),
                }
            } else {
                ExecError::Launch {
                    command: display.clone(),
                    source,
                }
            }
        })?;

        let live = command.is_live();
        let stdout_capture = child
            .stdout
            .take()
            .map(|pipe| Capture::spawn(pipe, live.then(tokio::io::stdout)));
        let stderr_capture = child
            .stderr
            .take()
            .map(|pipe| Capture::spawn(pipe, live.then(tokio::io::stderr)));

        let deadline = async {
            match command.timeout() {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Waited::Cancelled,
            status = child.wait() => Waited::Exited(status),
            limit = deadline => Waited::TimedOut(limit),
        };

        if !matches!(waited, Waited::Exited(_)) {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "failed to kill child");
            }
        }

        // The pipes can outlive the child when a grandchild inherited them,
        // so draining is bounded whether or not the child was killed.
        let (stdout, stderr) = tokio::join!(
            Capture::finish(stdout_capture, DRAIN_GRACE),
            Capture::finish(stderr_capture, DRAIN_GRACE),
        );

        match waited {
            Waited::Exited(status) => {
                let status = status.map_err(|source| ExecError::Launch {
                    command: display.clone(),
                    source,
                })?;
                let result = CommandResult::exited(status.code().unwrap_or(-1), stdout, stderr);
                if !result.success() && !command.is_quiet() {
                    // Live output has already reached the terminal.
                    self.console
                        .command_failed(&result, command.is_captured() && !command.is_live());
                }
                Ok(result)
            }
            Waited::TimedOut(timeout) => {
                if !command.is_quiet() {
                    self.console.failure(&format!(
                        "Command timed out after {}s",
                        timeout.as_secs()
                    ));
                }
                Err(ExecError::TimedOut {
                    command: display,
                    timeout,
                    partial: CommandResult {
                        stdout,
                        stderr,
                        exit_code: -1,
                        completed: false,
                    },
                })
            }
            Waited::Cancelled => Err(ExecError::Interrupted { command: display }),
        }
    }
}

/// Output collected from one child pipe by a background task.
///
/// The task appends raw chunks to a shared buffer, so whatever arrived before
/// the task is abandoned is still available. Bytes are decoded lossily once
/// the pipe is done.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    /// Starts draining `pipe` to EOF, forwarding each chunk to `echo` when given.
    fn spawn<R, W>(mut pipe: R, mut echo: Option<W>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        lock(&sink).extend_from_slice(&chunk[..n]);
                        if let Some(out) = echo.as_mut() {
                            let forwarded = out.write_all(&chunk[..n]).await.and(out.flush().await);
                            if forwarded.is_err() {
                                echo = None;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "stopped reading child output");
                        break;
                    }
                }
            }
        });
        Self { buffer, task }
    }

    /// Waits up to `grace` for the pipe to close, then keeps what was read.
    async fn finish(capture: Option<Self>, grace: Duration) -> String {
        let Some(Capture { buffer, task }) = capture else {
            return String::new();
        };
        let abort = task.abort_handle();
        if tokio::time::timeout(grace, task).await.is_err() {
            abort.abort();
            debug!("output pipe still open after the child finished, keeping partial output");
        }
        let bytes = lock(&buffer);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn lock(buffer: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
