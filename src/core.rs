//! # Core Module
//!
//! This module contains the core functionality of the pipeline,
//! including data models, configuration, tool resolution, stage
//! sequencing and the integration scenario battery.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod scenarios;

// Re-exports
pub use error::{ExecError, PipelineError};
pub use models::{Stage, TestReport};
pub use pipeline::Pipeline;
