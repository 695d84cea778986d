//! # Console Reporting Module
//!
//! Operator-facing output. Every line goes through a `Console` value that
//! carries the color choice, so nothing here depends on global styling state.

use colored::*;

use crate::core::models::{CommandResult, TestReport};

/// Printer for progress lines, command echoes and test summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Console {
    color: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Console {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// A console that never emits ANSI escapes.
    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn line(&self, text: &str) {
        println!("{text}");
    }

    pub fn heading(&self, text: &str) {
        println!("{}", self.paint(text, |t| t.blue().bold()));
    }

    /// Announces the start of a stage or long step.
    pub fn progress(&self, text: &str) {
        println!("{}", self.paint(text, |t| t.yellow()));
    }

    pub fn success(&self, text: &str) {
        println!("{}", self.paint(text, |t| t.green()));
    }

    pub fn warning(&self, text: &str) {
        println!("{}", self.paint(text, |t| t.yellow()));
    }

    pub fn failure(&self, text: &str) {
        println!("{}", self.paint(text, |t| t.red()));
    }

    /// The single fatal line printed by the entry point.
    pub fn error(&self, text: &str) {
        eprintln!("{}", self.paint(&format!("Error: {text}"), |t| t.red()));
    }

    pub fn running(&self, command_line: &str) {
        println!(
            "{}",
            self.paint(&format!("Running: {command_line}"), |t| t.cyan())
        );
    }

    /// Reports a non-zero exit, including captured output when there is any.
    pub fn command_failed(&self, result: &CommandResult, captured: bool) {
        self.failure(&format!(
            "Command failed with exit code {}",
            result.exit_code
        ));
        if captured {
            println!("stdout: {}", result.stdout.trim_end());
            println!("stderr: {}", result.stderr.trim_end());
        }
    }

    pub fn scenario_passed(&self, name: &str) {
        println!("{}", self.paint(&format!("✓ {name} PASSED"), |t| t.green()));
    }

    pub fn scenario_failed(&self, name: &str, reason: &str) {
        println!(
            "{}",
            self.paint(&format!("✗ {name} FAILED: {reason}"), |t| t.red())
        );
    }

    /// Prints the pass/fail totals of a finished battery.
    ///
    /// ```text
    /// Test Summary:
    /// Passed: 3
    /// Failed: 1
    /// ```
    pub fn report_summary(&self, report: &TestReport) {
        println!("\n{}", self.paint("Test Summary:", |t| t.bold()));
        println!("Passed: {}", report.passed());
        println!("Failed: {}", report.failed());
        if report.failed() == 0 {
            self.success("All tests passed! ✓");
        }
    }
}
