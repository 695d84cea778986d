//! # Scenario Checks Module
//!
//! The integration battery run against the subject executable, and the
//! aggregator that turns scenario outcomes into a `TestReport`.
//!
//! A scenario never aborts the batch: a failed predicate, a timeout or a
//! missing program each record exactly one failure and the next scenario runs.
//! Only the absence of any subject executable is fatal, since then there is
//! nothing to test.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{
    core::{
        error::{ExecError, PipelineError},
        models::{CommandResult, CommandSpec, TestReport},
    },
    infra::command::Executor,
    reporting::console::Console,
};

/// Upper bound for scenarios that pass a word to the subject.
pub const WORD_TIMEOUT_SECS: u64 = 30;
/// Upper bound for the no-argument scenario.
pub const USAGE_TIMEOUT_SECS: u64 = 10;

/// The predicate a scenario applies to the subject's observable behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "expect", rename_all = "kebab-case")]
pub enum Expectation {
    /// Exit 0 and `word` appears as one of the output lines.
    Word { word: String },
    /// Exit 0 and at least one of `words` appears among the output lines.
    AnyOf { words: Vec<String> },
    /// Non-zero exit and `marker` appears in stdout or stderr.
    Usage {
        #[serde(default = "default_usage_marker")]
        marker: String,
    },
}

fn default_usage_marker() -> String {
    "Usage".to_string()
}

impl Expectation {
    /// Checks a completed run against the predicate.
    /// Returns the failure reason when the predicate does not hold.
    pub fn evaluate(&self, result: &CommandResult) -> Result<(), String> {
        match self {
            Expectation::Word { word } => {
                let words = expect_success(result)?;
                if words.is_empty() {
                    return Err("No words found in output".to_string());
                }
                if !words.contains(&word.as_str()) {
                    return Err(format!("Original word '{word}' not found in output"));
                }
                Ok(())
            }
            Expectation::AnyOf { words: expected } => {
                let words = expect_success(result)?;
                if expected.iter().any(|w| words.contains(&w.as_str())) {
                    Ok(())
                } else {
                    Err(format!(
                        "None of expected words [{}] found in output",
                        expected.join(", ")
                    ))
                }
            }
            Expectation::Usage { marker } => {
                if result.exit_code == 0 {
                    return Err("Expected non-zero exit code with no arguments".to_string());
                }
                if !result.stdout.contains(marker.as_str())
                    && !result.stderr.contains(marker.as_str())
                {
                    return Err(format!("Expected '{marker}' message in error output"));
                }
                Ok(())
            }
        }
    }
}

fn expect_success(result: &CommandResult) -> Result<Vec<&str>, String> {
    if result.exit_code != 0 {
        return Err(format!(
            "Non-zero exit code: {}, stderr: {}",
            result.exit_code,
            result.stderr.trim()
        ));
    }
    Ok(result.stdout_lines())
}

/// One named behavioral assertion against the subject executable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    /// Literal arguments passed after the subject path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Bounded wait for the subject. Defaults depend on whether args are given.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub expect: Expectation,
}

impl Scenario {
    pub fn word(name: &str, word: &str) -> Self {
        Self {
            name: name.to_string(),
            args: vec![word.to_string()],
            timeout_secs: None,
            expect: Expectation::Word {
                word: word.to_string(),
            },
        }
    }

    pub fn any_of(name: &str, word: &str, expected: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: vec![word.to_string()],
            timeout_secs: None,
            expect: Expectation::AnyOf {
                words: expected.iter().map(|w| w.to_string()).collect(),
            },
        }
    }

    pub fn usage(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            timeout_secs: None,
            expect: Expectation::Usage {
                marker: default_usage_marker(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        let secs = self.timeout_secs.unwrap_or(if self.args.is_empty() {
            USAGE_TIMEOUT_SECS
        } else {
            WORD_TIMEOUT_SECS
        });
        Duration::from_secs(secs)
    }
}

/// The built-in battery, in the order it runs.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::word("basic", "TEST"),
        Scenario::any_of("complex", "LISTEN", &["LISTEN", "SILENT"]),
        Scenario::word("short", "CAT"),
        Scenario::usage("no-argument"),
    ]
}

/// Default subject locations relative to the project root, highest priority first.
pub fn default_subject_candidates() -> Vec<String> {
    let suffix = std::env::consts::EXE_SUFFIX;
    [
        "./findword",
        "./build/default/bin/findword",
        "./build/release/bin/findword",
        "./build/debug/bin/findword",
        "../findword",
    ]
    .iter()
    .map(|path| format!("{path}{suffix}"))
    .collect()
}

/// Returns the first candidate that exists as a file under `root`.
pub fn discover_subject(root: &Path, candidates: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|path| path.is_file())
}

/// Runs a scenario battery against a subject executable.
pub struct ResultAggregator<'a, E: Executor> {
    executor: &'a E,
    console: Console,
}

impl<'a, E: Executor> ResultAggregator<'a, E> {
    pub fn new(executor: &'a E, console: Console) -> Self {
        Self { executor, console }
    }

    /// Runs a scenario battery against the subject executable.
    ///
    /// # Arguments
    ///
    /// * `root` - Project root the candidate paths are relative to.
    /// * `subject_candidates` - Possible subject locations, first existing file wins.
    /// * `scenarios` - The battery, run in declared order.
    ///
    /// # Returns
    ///
    /// The subject path that was tested and a `TestReport` with exactly one
    /// outcome per scenario. Failed predicates, timeouts and launch faults are
    /// recorded as failures and the batch continues.
    ///
    /// # Errors
    ///
    /// `PipelineError::MissingArtifact` when no candidate exists, or the
    /// interruption error if the run was cancelled.
    pub async fn run_all(
        &self,
        root: &Path,
        subject_candidates: &[String],
        scenarios: &[Scenario],
    ) -> Result<(PathBuf, TestReport), PipelineError> {
        let subject = discover_subject(root, subject_candidates).ok_or_else(|| {
            PipelineError::MissingArtifact(format!(
                "No executable found (searched: {}). Please build the project first.",
                subject_candidates.join(", ")
            ))
        })?;

        self.console.heading("Running integration scenarios");
        self.console.line(&format!("Subject: {}", subject.display()));

        let mut report = TestReport::new();
        for scenario in scenarios {
            match self.check(&subject, scenario).await? {
                Ok(()) => {
                    self.console.scenario_passed(&scenario.name);
                    report.record_pass(&scenario.name);
                }
                Err(reason) => {
                    self.console.scenario_failed(&scenario.name, &reason);
                    report.record_failure(&scenario.name, reason);
                }
            }
        }

        self.console.report_summary(&report);
        Ok((subject, report))
    }

    /// The outer error is reserved for interruption, which stops the batch.
    async fn check(
        &self,
        subject: &Path,
        scenario: &Scenario,
    ) -> Result<Result<(), String>, PipelineError> {
        let subject_str = subject.to_string_lossy().into_owned();
        let argv = std::iter::once(subject_str.clone()).chain(scenario.args.iter().cloned());
        let command = CommandSpec::new(argv)
            .captured()
            .quiet()
            .with_timeout(scenario.timeout());

        debug!(scenario = %scenario.name, command = %command.display(), "running scenario");

        let verdict = match self.executor.execute(&command).await {
            Ok(result) => scenario.expect.evaluate(&result),
            Err(ExecError::TimedOut { timeout, .. }) => Err(format!(
                "Timeout after {}s running subject with {}",
                timeout.as_secs(),
                describe_args(&scenario.args)
            )),
            Err(ExecError::NotFound { .. }) => Err(format!("Executable not found: {subject_str}")),
            Err(err @ ExecError::Interrupted { .. }) => return Err(err.into()),
            Err(err) => Err(format!("{:#}", anyhow::Error::new(err))),
        };
        Ok(verdict)
    }
}

fn describe_args(args: &[String]) -> String {
    if args.is_empty() {
        "no arguments".to_string()
    } else {
        format!("'{}'", args.join(" "))
    }
}
