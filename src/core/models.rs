//! # Data Models Module
//!
//! This module defines the core data structures shared by the executor, the
//! tool resolver, the stage pipeline and the result aggregator.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single external command to run.
/// Built once with the `with_*` style helpers and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    capture: bool,
    live: bool,
    timeout: Option<Duration>,
    quiet: bool,
}

impl CommandSpec {
    /// Creates a command from its argv tokens. The first token is the program.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            capture: false,
            live: false,
            timeout: None,
            quiet: false,
        }
    }

    /// Runs the command in `dir`, relative to the executor's base directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Captures stdout and stderr instead of streaming them to the terminal.
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Captures output and also forwards it to the terminal as it arrives.
    pub fn live(mut self) -> Self {
        self.capture = true;
        self.live = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Suppresses the operator echo. Used for probes and scenario runs.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn is_captured(&self) -> bool {
        self.capture
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Renders the argv as a shell-quoted line for logs and error messages.
    pub fn display(&self) -> String {
        shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "))
    }
}

/// The outcome of one executor invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Captured stdout. Empty when the command streamed its output.
    pub stdout: String,
    /// Captured stderr. Empty when the command streamed its output.
    pub stderr: String,
    /// Process exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// `false` only for the partial result attached to a timeout.
    pub completed: bool,
}

impl CommandResult {
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            completed: true,
        }
    }

    pub fn success(&self) -> bool {
        self.completed && self.exit_code == 0
    }

    /// Non-empty, trimmed stdout lines in order.
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// First non-empty line of stdout, falling back to stderr.
    /// Version probes print their banner on either stream.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

/// A command chosen from a candidate list, together with its probe banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub command: String,
    pub version: Option<String>,
}

impl fmt::Display for ResolvedTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({})", self.command, version),
            None => write!(f, "{}", self.command),
        }
    }
}

/// The closed set of pipeline stages selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Stage {
    Setup,
    Build,
    Test,
    Package,
    Clean,
    Info,
    All,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::Package => "package",
            Stage::Clean => "clean",
            Stage::Info => "info",
            Stage::All => "all",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build variant passed to the configure step as `CMAKE_BUILD_TYPE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Release,
    Debug,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Release => f.write_str("Release"),
            Variant::Debug => f.write_str("Debug"),
        }
    }
}

/// Selects the Build sub-path: which variant to configure and, when a preset
/// descriptor exists, which preset to use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    pub variant: Variant,
    /// Overrides the preset name the variant would otherwise map to.
    pub preset: Option<String>,
}

impl BuildConfig {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            preset: None,
        }
    }

    pub fn with_preset(mut self, preset: Option<String>) -> Self {
        self.preset = preset;
        self
    }
}

/// The result of a single scenario check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScenarioOutcome {
    Passed { name: String },
    Failed { name: String, reason: String },
}

impl ScenarioOutcome {
    pub fn name(&self) -> &str {
        match self {
            ScenarioOutcome::Passed { name } | ScenarioOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScenarioOutcome::Failed { .. })
    }
}

/// Pass/fail tally for one aggregator run.
///
/// Outcomes can only be appended, so both counts are monotonic. The
/// aggregator hands the report out by value once the battery is done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    outcomes: Vec<ScenarioOutcome>,
}

impl TestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, name: impl Into<String>) {
        self.outcomes.push(ScenarioOutcome::Passed { name: name.into() });
    }

    pub fn record_failure(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.outcomes.push(ScenarioOutcome::Failed {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn outcomes(&self) -> &[ScenarioOutcome] {
        &self.outcomes
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// 0 iff no scenario failed.
    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 { 0 } else { 1 }
    }
}
