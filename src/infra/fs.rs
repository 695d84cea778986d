//! # File System Operations Module
//!
//! Small helpers the stages use to probe and tidy the project tree.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::PipelineError;

/// Checks if a path exists and is a directory.
pub fn is_directory(path: &Path) -> bool {
    path.exists() && path.is_dir()
}

/// Returns every candidate directory under `root` that exists, in list order.
pub fn existing_dirs<'a>(root: &Path, candidates: &'a [String]) -> Vec<&'a str> {
    candidates
        .iter()
        .filter(|dir| is_directory(&root.join(dir)))
        .map(String::as_str)
        .collect()
}

/// The first candidate directory under `root` that exists.
pub fn first_existing_dir<'a>(root: &Path, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|dir| is_directory(&root.join(dir)))
        .map(String::as_str)
}

pub fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .map_err(|e| PipelineError::io(format!("Failed to create {}", path.display()), e))
}

/// Removes a directory tree. Returns `false` when there was nothing to remove.
pub fn remove_dir(path: &Path) -> Result<bool, PipelineError> {
    if !path.exists() {
        return Ok(false);
    }
    fs_extra::dir::remove(path).map_err(|e| {
        PipelineError::io(
            format!("Failed to remove {}", path.display()),
            std::io::Error::other(e.to_string()),
        )
    })?;
    Ok(true)
}

/// Removes a single file. Returns `false` when there was nothing to remove.
pub fn remove_file(path: &Path) -> Result<bool, PipelineError> {
    if !path.is_file() {
        return Ok(false);
    }
    fs_extra::file::remove(path).map_err(|e| {
        PipelineError::io(
            format!("Failed to remove {}", path.display()),
            std::io::Error::other(e.to_string()),
        )
    })?;
    Ok(true)
}

/// Expands a file name or glob pattern relative to `root` into the regular
/// files it currently matches, sorted for a stable removal order.
pub fn matching_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);
    let entries = glob::glob(&full)
        .map_err(|e| PipelineError::InvalidConfig(format!("bad clean pattern `{pattern}`: {e}")))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
