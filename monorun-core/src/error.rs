//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

use crate::runner::TaskFailure;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest parse error in {path}: {error}")]
    Manifest {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),

    #[error("Task failed for {package}: {message}")]
    RunAborted { package: String, message: String },

    #[error("{} task(s) failed: {}", .failures.len(), render_failures(.failures))]
    AggregateFailure { failures: Vec<TaskFailure> },

    #[error("Filter prerequisite missing: {0}")]
    FilterPrerequisite(String),

    #[error("Failed to run script for {package}: {message}")]
    Spawn { package: String, message: String },
}

fn render_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.package, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
