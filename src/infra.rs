//! # Infrastructure Module
//!
//! This module provides infrastructure services for the pipeline,
//! including command execution, file system operations and logging.

pub mod command;
pub mod fs;
pub mod logging;
