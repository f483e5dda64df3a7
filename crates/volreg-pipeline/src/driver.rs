//! The staged registration driver.
//!
//! Runs the engine through the ordered stage plan, threading each stage's
//! linear result into the next as its initialization, and refuses to call
//! a run successful until the warped artifact is actually on disk.

use crate::error::{PipelineError, Result};
use crate::init::InitializationPlan;
use crate::outcome::{DiagnosticTrail, RegistrationOutcome};
use crate::verify::OutputVerifier;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use volreg_core::transform::{artifact_path, AFFINE_SUFFIX, WARPED_SUFFIX};
use volreg_core::{StagePlan, TransformArtifact, Volume};
use volreg_engine::{RegistrationBackend, RegistrationJob};

/// Everything one registration call needs. Created fresh per call and
/// consumed by the driver.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub fixed: Volume,
    pub moving: Volume,
    /// Path prefix all artifacts are written under.
    pub output_prefix: PathBuf,
    pub initialization: InitializationPlan,
    /// Cost-function mask for the main stages, when one survived the
    /// selector independently of the initialization plan.
    pub cost_mask: Option<Volume>,
    pub plan: StagePlan,
}

impl RegistrationRequest {
    pub fn new(fixed: Volume, moving: Volume, output_prefix: impl Into<PathBuf>) -> Self {
        Self {
            fixed,
            moving,
            output_prefix: output_prefix.into(),
            initialization: InitializationPlan::Unguided,
            cost_mask: None,
            plan: StagePlan::full(None),
        }
    }

    pub fn with_initialization(mut self, initialization: InitializationPlan) -> Self {
        self.initialization = initialization;
        self
    }

    pub fn with_cost_mask(mut self, mask: Volume) -> Self {
        self.cost_mask = Some(mask);
        self
    }

    pub fn with_plan(mut self, plan: StagePlan) -> Self {
        self.plan = plan;
        self
    }
}

/// Drives the engine through a stage plan.
pub struct StagedDriver<'a> {
    backend: &'a dyn RegistrationBackend,
    verifier: OutputVerifier,
}

impl<'a> StagedDriver<'a> {
    pub fn new(backend: &'a dyn RegistrationBackend) -> Self {
        Self {
            backend,
            verifier: OutputVerifier::new(),
        }
    }

    /// Run the full plan.
    ///
    /// Errors propagate untouched so the caller can route them into
    /// recovery; the driver itself performs no fallback.
    pub fn register(&self, request: &RegistrationRequest) -> Result<RegistrationOutcome> {
        request
            .plan
            .validate()
            .map_err(PipelineError::invalid_configuration)?;

        let mut trail = DiagnosticTrail::new();
        let mut seed: Option<PathBuf> = match &request.initialization {
            InitializationPlan::Reuse { transform } => Some(transform.clone()),
            InitializationPlan::GuidedByMask { transform, .. } => Some(transform.clone()),
            InitializationPlan::CostMasked { .. } | InitializationPlan::Unguided => None,
        };
        let cost_mask = match &request.initialization {
            InitializationPlan::CostMasked { mask } => Some(mask),
            _ => request.cost_mask.as_ref(),
        };

        let total = request.plan.len();
        for (index, stage) in request.plan.stages().iter().enumerate() {
            let last = index + 1 == total;
            let prefix = if last {
                request.output_prefix.clone()
            } else {
                PathBuf::from(format!(
                    "{}s{}{}_",
                    request.output_prefix.display(),
                    index,
                    stage.kind
                ))
            };

            info!(
                stage = %stage.kind,
                index,
                total,
                backend = self.backend.name(),
                prefix = %prefix.display(),
                "running registration stage"
            );
            let job = RegistrationJob {
                fixed: &request.fixed,
                moving: &request.moving,
                output_prefix: &prefix,
                stage,
                initial_transform: seed.as_deref(),
                fixed_mask: cost_mask,
            };
            self.backend.run_stage(&job)?;
            trail.record(format!("{}:{}", self.backend.name(), stage.kind), "completed");

            if !last {
                // The next stage is seeded by this stage's linear result.
                let linear = artifact_path(&prefix, AFFINE_SUFFIX);
                if !linear.is_file() {
                    return Err(PipelineError::artifact_missing(linear));
                }
                seed = Some(linear);
            }
        }

        // Exit status alone is not proof of success: the warped volume must
        // exist and be non-empty under the canonical name (or a repairable
        // variant of it).
        let warped_path = self
            .verifier
            .ensure_canonical(&request.output_prefix)
            .ok_or_else(|| {
                PipelineError::artifact_missing(artifact_path(
                    &request.output_prefix,
                    WARPED_SUFFIX,
                ))
            })?;

        let artifact =
            TransformArtifact::discover(&request.output_prefix, request.plan.ends_nonlinear());
        if !artifact.is_consistent() {
            warn!(
                prefix = %request.output_prefix.display(),
                "nonlinear registration left a linear-only transform set"
            );
            trail.record(
                "transform-check",
                "nonlinear stage produced no warp field; application will reject this transform",
            );
        }

        let warped = Volume::new(
            warped_path,
            request.fixed.geometry().clone(),
            request.moving.kind(),
        );
        Ok(RegistrationOutcome::succeeded(warped, artifact, trail))
    }
}
