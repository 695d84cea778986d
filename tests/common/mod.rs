// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use findword_pipeline::core::error::ExecError;
use findword_pipeline::core::models::{CommandResult, CommandSpec};
use findword_pipeline::infra::command::Executor;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

type Script = Box<dyn Fn(&CommandSpec) -> Result<CommandResult, ExecError> + Send + Sync>;

/// An `Executor` that answers from a closure and records every command it saw.
pub struct FakeExecutor {
    script: Script,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeExecutor {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandResult, ExecError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command exits 0 with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(ok("")))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Each recorded argv joined with spaces.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.argv().join(" "))
            .collect()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, command: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.calls.lock().unwrap().push(command.clone());
        (self.script)(command)
    }
}

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult::exited(0, stdout, "")
}

pub fn exit(code: i32, stdout: &str, stderr: &str) -> CommandResult {
    CommandResult::exited(code, stdout, stderr)
}

pub fn not_found(command: &CommandSpec) -> ExecError {
    ExecError::NotFound {
        program: command.program().to_string(),
    }
}

pub fn timed_out(command: &CommandSpec) -> ExecError {
    ExecError::TimedOut {
        command: command.display(),
        timeout: command.timeout().unwrap_or(Duration::from_secs(1)),
        partial: CommandResult::default(),
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// An empty project directory.
pub fn setup_project() -> TempDir {
    tempdir().expect("Failed to create temporary directory")
}

pub fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, "").expect("Failed to write file");
}

pub fn mkdir(root: &Path, relative: &str) {
    fs::create_dir_all(root.join(relative)).expect("Failed to create directory");
}

/// Writes an executable shell script, for tests that spawn real processes.
#[cfg(unix)]
pub fn write_script(root: &Path, relative: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A stand-in for the findword executable that knows a few anagram sets.
#[cfg(unix)]
pub const FAKE_FINDWORD: &str = r#"if [ $# -eq 0 ]; then
  echo "Usage: findword <word>" >&2
  exit 1
fi
case "$1" in
  LISTEN) printf 'ENLIST\nLISTEN\nSILENT\nTINSEL\n' ;;
  *) echo "$1" ;;
esac"#;
