//! Registration outcomes and diagnostic trails.
//!
//! "Succeeded" is a type-level fact here: downstream code branches on the
//! status tag, never on renewed filesystem probes.

use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use volreg_core::{TransformArtifact, Volume};

/// Terminal status of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// The staged driver completed normally.
    Succeeded,
    /// A fallback method produced the result; carries the method name.
    RecoveredViaFallback(String),
    /// All methods exhausted; the warped handle points at a placeholder.
    Failed,
}

impl RegistrationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::RecoveredViaFallback(method) => write!(f, "recovered-via-{}", method),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One attempted method and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub method: String,
    pub detail: String,
}

/// Ordered record of everything that was tried for a request.
///
/// Persisted next to the outputs on terminal failure so the run can be
/// debugged without re-executing the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticTrail {
    records: Vec<AttemptRecord>,
}

impl DiagnosticTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, method: impl Into<String>, detail: impl Into<String>) {
        self.records.push(AttemptRecord {
            method: method.into(),
            detail: detail.into(),
        });
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the trail as a plain text file, one attempt per line.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        for record in &self.records {
            writeln!(file, "{}: {}", record.method, record.detail)?;
        }
        Ok(())
    }
}

impl fmt::Display for DiagnosticTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{}: {}", record.method, record.detail)?;
        }
        Ok(())
    }
}

/// The result of driving one registration request to a terminal state.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub status: RegistrationStatus,
    /// The warped volume; a zero-filled placeholder when `status` is
    /// `Failed`.
    pub warped: Volume,
    pub transform: TransformArtifact,
    pub trail: DiagnosticTrail,
}

impl RegistrationOutcome {
    pub fn succeeded(warped: Volume, transform: TransformArtifact, trail: DiagnosticTrail) -> Self {
        Self {
            status: RegistrationStatus::Succeeded,
            warped,
            transform,
            trail,
        }
    }

    pub fn recovered(
        method: impl Into<String>,
        warped: Volume,
        transform: TransformArtifact,
        trail: DiagnosticTrail,
    ) -> Self {
        Self {
            status: RegistrationStatus::RecoveredViaFallback(method.into()),
            warped,
            transform,
            trail,
        }
    }

    pub fn failed(placeholder: Volume, transform: TransformArtifact, trail: DiagnosticTrail) -> Self {
        Self {
            status: RegistrationStatus::Failed,
            warped: placeholder,
            transform,
            trail,
        }
    }

    /// Convert a `Failed` status into the matching error; success and
    /// recovered outcomes pass.
    pub fn require_success(&self) -> Result<(), PipelineError> {
        if self.status.is_failure() {
            return Err(PipelineError::AllFallbacksExhausted {
                attempts: self.trail.len(),
            });
        }
        Ok(())
    }
}
