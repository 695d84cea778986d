//! # Reporting Module
//!
//! Console output for operators and JSON reports for CI.

pub mod console;
pub mod json;

// Re-export common reporting functions
pub use console::Console;
pub use json::write_report;
