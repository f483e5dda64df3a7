//! Error type for engine invocation and volume utilities.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures surfaced by external tools and the volume-utility adapters.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The tool binary is not installed or not on PATH.
    #[error("{tool} not found on PATH")]
    ToolNotFound { tool: String },

    /// The tool ran and exited non-zero.
    #[error("{tool} exited with status {status}: {stderr}")]
    InvocationFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// The tool reported success but an expected output file is absent.
    #[error("expected output missing: {}", path.display())]
    OutputMissing { path: PathBuf },

    /// A volume file exists but could not be interpreted.
    #[error("unreadable volume {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// The adapter cannot perform the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn invocation_failed(tool: impl Into<String>, status: i32, stderr: impl Into<String>) -> Self {
        Self::InvocationFailed {
            tool: tool.into(),
            status,
            stderr: stderr.into(),
        }
    }

    pub fn output_missing(path: impl Into<PathBuf>) -> Self {
        Self::OutputMissing { path: path.into() }
    }

    pub fn format(path: &Path, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
