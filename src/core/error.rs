//! # Error Types Module
//!
//! Typed failures for process execution and for the pipeline stages.
//! `ExecError` describes why a single command could not produce a normal
//! exit; `PipelineError` is what a stage returns when it cannot finish.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::models::CommandResult;

/// Failures of a single process launch that are not a plain non-zero exit.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program does not exist on the search path or at the given location.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The bounded wait elapsed and the process was killed.
    /// `partial` holds whatever output was captured before the kill.
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut {
        command: String,
        timeout: Duration,
        partial: CommandResult,
    },

    /// The run was cancelled from outside (Ctrl-C) and the process was killed.
    #[error("`{command}` was interrupted")]
    Interrupted { command: String },

    /// The operating system refused to start the process.
    #[error("failed to launch `{command}`")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Fatal stage failures, surfaced at the CLI boundary as exit code 1.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{tool} not found (tried: {})", .tried.join(", "))]
    ToolNotFound { tool: String, tried: Vec<String> },

    #[error("`{command}` failed with exit code {code}")]
    ProcessFailure { command: String, code: i32 },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimeoutFailure { command: String, timeout: Duration },

    #[error("{0}")]
    MissingArtifact(String),

    #[error("{failed} of {total} integration scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Exec(ExecError),
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<ExecError> for PipelineError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::NotFound { program } => {
                PipelineError::MissingArtifact(format!("executable not found: {program}"))
            }
            ExecError::TimedOut {
                command, timeout, ..
            } => PipelineError::TimeoutFailure { command, timeout },
            other => PipelineError::Exec(other),
        }
    }
}
