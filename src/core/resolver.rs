//! # Tool Resolution Module
//!
//! Picks a command from an ordered candidate list by probing each one with a
//! version invocation. The first candidate whose probe exits 0 wins and no
//! later candidate is probed, even if it would also succeed.

use std::time::Duration;
use tracing::debug;

use crate::{
    core::{
        error::{ExecError, PipelineError},
        models::{CommandSpec, ResolvedTool},
    },
    infra::command::Executor,
};

/// Probes candidate lists through an `Executor`. Holds no cache: every
/// resolver call probes afresh, callers keep the `ResolvedTool` they get.
pub struct ToolResolver<'a, E: Executor> {
    executor: &'a E,
    probe_args: Vec<String>,
    probe_timeout: Duration,
}

impl<'a, E: Executor> ToolResolver<'a, E> {
    pub fn new(executor: &'a E, probe_timeout: Duration) -> Self {
        Self {
            executor,
            probe_args: vec!["--version".to_string()],
            probe_timeout,
        }
    }

    /// Picks the first viable command from an ordered candidate list.
    ///
    /// # Arguments
    ///
    /// * `tool` - Human-readable label used in the error, e.g. "Build tool".
    /// * `candidates` - Command names in priority order.
    ///
    /// # Returns
    ///
    /// The first candidate whose `--version` probe exits 0, with the first line
    /// of its banner. Later candidates are not probed.
    ///
    /// # Errors
    ///
    /// `PipelineError::ToolNotFound` listing every candidate once all probes
    /// failed, or the interruption error if the run was cancelled mid-probe.
    pub async fn resolve(
        &self,
        tool: &str,
        candidates: &[String],
    ) -> Result<ResolvedTool, PipelineError> {
        match self.first_available(candidates).await? {
            Some(resolved) => Ok(resolved),
            None => Err(PipelineError::ToolNotFound {
                tool: tool.to_string(),
                tried: candidates.to_vec(),
            }),
        }
    }

    /// Like `resolve`, but reports "nothing available" as `None`.
    /// Interruption is still an error.
    pub async fn first_available(
        &self,
        candidates: &[String],
    ) -> Result<Option<ResolvedTool>, PipelineError> {
        for candidate in candidates {
            if let Some(resolved) = self.probe(candidate).await? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    async fn probe(&self, candidate: &str) -> Result<Option<ResolvedTool>, PipelineError> {
        let argv = std::iter::once(candidate.to_string()).chain(self.probe_args.iter().cloned());
        let command = CommandSpec::new(argv)
            .captured()
            .quiet()
            .with_timeout(self.probe_timeout);

        match self.executor.execute(&command).await {
            Ok(result) if result.success() => {
                debug!(candidate, "probe succeeded");
                Ok(Some(ResolvedTool {
                    command: candidate.to_string(),
                    version: result.first_line().map(str::to_string),
                }))
            }
            Ok(result) => {
                debug!(candidate, exit_code = result.exit_code, "probe exited non-zero");
                Ok(None)
            }
            Err(err @ ExecError::Interrupted { .. }) => Err(err.into()),
            Err(err) => {
                debug!(candidate, error = %err, "probe failed");
                Ok(None)
            }
        }
    }
}
