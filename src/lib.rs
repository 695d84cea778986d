//! # Findword Pipeline Library
//!
//! Build, test and packaging orchestration for the findword word-search tool.
//! Tools are discovered by probing ordered candidate lists, stages run their
//! external commands one at a time with fallbacks where a step is optional,
//! and the test stage checks the built executable against a scenario battery.
//!
//! ## Modules
//!
//! - `core` - Data models, configuration, tool resolution, the stage pipeline and scenario checks
//! - `infra` - Process execution, file system helpers and logging setup
//! - `reporting` - Console output and JSON test reports
//! - `cli` - Command-line interface

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use self::core::config;
pub use self::core::error;
pub use self::core::models;
pub use self::core::pipeline;
