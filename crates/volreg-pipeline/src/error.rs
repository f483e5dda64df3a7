//! Error taxonomy for the orchestration pipeline.

use std::path::PathBuf;
use thiserror::Error;
use volreg_core::TransformChainError;
use volreg_engine::EngineError;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required input volume is missing, unreadable, or fails a basic
    /// integrity check. Surfaced immediately, never retried.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The external engine returned a failure. Triggers fallback handling
    /// rather than immediate propagation.
    #[error("engine invocation failed: {0}")]
    Engine(#[from] EngineError),

    /// The engine reported success but an expected output is absent.
    /// Escalated exactly like an engine failure; never trusted.
    #[error("expected artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// A transform artifact violates its structural invariant at the point
    /// of application.
    #[error(transparent)]
    TransformIncomplete(#[from] TransformChainError),

    /// Every fallback method was attempted and failed. A placeholder has
    /// been written; this must reach the caller as a failure.
    #[error("registration failed after {attempts} fallback attempts")]
    AllFallbacksExhausted { attempts: usize },

    /// A request or configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn input_invalid(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    pub fn artifact_missing(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactMissing { path: path.into() }
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
