//! Structured error types for pipeline tasks.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling and log fields.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Transformation errors
    TransformFailed,
    ToolNotFound,
    ToolFailed,
    MissingReference,

    // Quality gate
    LintFailed,

    // Filesystem errors
    UnsafeDelete,
    DeleteFailed,
    InvalidPattern,
    IoError,

    // Dev server / deploy
    WatchFailed,
    PublishFailed,
}

/// Failure of a pipeline task.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("'{task}' failed on {}: {message}", file.display())]
    Transform {
        task: String,
        file: PathBuf,
        message: String,
    },

    #[error("failed to start `{program}`: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{} references `{reference}`, which is not in any search path", page.display())]
    MissingReference { page: PathBuf, reference: String },

    #[error("lint found {errors} error(s) and {warnings} warning(s)")]
    LintFailed { errors: usize, warnings: usize },

    #[error("refusing to delete {}: {reason}", path.display())]
    UnsafeDelete { path: PathBuf, reason: &'static str },

    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transform(task: &str, file: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Transform {
            task: task.to_string(),
            file: file.into(),
            message: err.to_string(),
        }
    }

    pub fn pattern(pattern: &str, source: glob::PatternError) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transform { .. } => ErrorCode::TransformFailed,
            Self::ToolSpawn { .. } => ErrorCode::ToolNotFound,
            Self::ToolFailed { .. } => ErrorCode::ToolFailed,
            Self::MissingReference { .. } => ErrorCode::MissingReference,
            Self::LintFailed { .. } => ErrorCode::LintFailed,
            Self::UnsafeDelete { .. } => ErrorCode::UnsafeDelete,
            Self::Delete { .. } => ErrorCode::DeleteFailed,
            Self::Pattern { .. } => ErrorCode::InvalidPattern,
            Self::Watch(_) => ErrorCode::WatchFailed,
            Self::Publish(_) => ErrorCode::PublishFailed,
            Self::Io(_) => ErrorCode::IoError,
        }
    }
}

/// Find the pipeline error code behind an application-level error, if any.
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(PipelineError::code)
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
