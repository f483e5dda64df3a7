//! The pipeline facade: wires the components into the full flow.
//!
//! Reconcile coordinate metadata, pick an initialization, drive the staged
//! registration, verify or recover the output, assess quality, and persist
//! the reports. One facade call is one registration request; concurrent
//! requests must use distinct output prefixes.

use crate::apply::{AtlasRegion, LabelAtlas, TransformApplication};
use crate::cascade::{standard_methods, EmergencyCascade};
use crate::config::PipelineConfig;
use crate::driver::{RegistrationRequest, StagedDriver};
use crate::error::{PipelineError, Result};
use crate::init::{
    CostMaskInitialization, GuidedInitialization, InitializationContext, InitializationSelector,
    InitializationStrategy,
};
use crate::outcome::{DiagnosticTrail, RegistrationOutcome};
use crate::quality::{QualityAssessor, QualityReport};
use crate::reconcile::{CoordinateReconciler, OrientationCorrection};
use crate::report::{self, QualityCsvRow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use volreg_core::transform::artifact_path;
use volreg_core::{ContentKind, StagePlan, Volume};
use volreg_engine::{
    ImageStats, MaskOps, RegistrationBackend, Resampler, TissueClassifier, VolumeOps,
};

/// The external collaborators a pipeline instance works with.
#[derive(Clone, Copy)]
pub struct Toolbox<'a> {
    pub registration: &'a dyn RegistrationBackend,
    /// Independent, simpler linear tool for the last fallback tier.
    pub linear_fallback: &'a dyn RegistrationBackend,
    pub resampler: &'a dyn Resampler,
    pub volumes: &'a dyn VolumeOps,
    pub masks: &'a dyn MaskOps,
    pub stats: &'a dyn ImageStats,
    pub classifier: Option<&'a dyn TissueClassifier>,
}

/// Per-request options beyond the two volumes.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Externally supplied initialization transform to reuse.
    pub initial_transform: Option<PathBuf>,
    /// Structural mask for the cost-masked initialization tier.
    pub structural_mask: Option<PathBuf>,
    /// Existing segmentation for the guided tier.
    pub segmentation: Option<PathBuf>,
}

/// Everything a finished request produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub fixed: Volume,
    /// The moving volume as registered (after any coordinate correction).
    pub moving: Volume,
    pub outcome: RegistrationOutcome,
    pub quality: QualityReport,
    pub correction: OrientationCorrection,
}

/// Facade over the full registration flow.
pub struct RegistrationPipeline<'a> {
    config: PipelineConfig,
    toolbox: Toolbox<'a>,
}

impl<'a> RegistrationPipeline<'a> {
    pub fn new(config: PipelineConfig, toolbox: Toolbox<'a>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, toolbox })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one registration request end to end.
    pub fn run(
        &self,
        fixed_path: &Path,
        moving_path: &Path,
        output_prefix: &Path,
        options: &RunOptions,
    ) -> Result<PipelineRun> {
        let fixed = self.probe_required(fixed_path, ContentKind::Continuous)?;
        let moving = self.probe_required(moving_path, ContentKind::Continuous)?;

        if let Some(parent) = output_prefix.parent() {
            fs::create_dir_all(parent)?;
        }
        let workdir = PathBuf::from(format!("{}work", output_prefix.display()));
        fs::create_dir_all(&workdir)?;

        // 1. Coordinate metadata must agree before any transform is
        // trusted.
        let reconciler = CoordinateReconciler::new(self.toolbox.volumes);
        let (moving, correction) = reconciler.reconcile(&fixed, &moving, &workdir)?;

        // 2. Initialization tiers, first viable wins.
        let structural_mask = self.probe_optional(options.structural_mask.as_deref());
        let segmentation = self.probe_optional(options.segmentation.as_deref());
        let ctx = InitializationContext {
            fixed: &fixed,
            moving: &moving,
            workdir: &workdir,
        };
        let mut strategies: Vec<Box<dyn InitializationStrategy + '_>> = Vec::new();
        if self.config.use_guided_initialization {
            strategies.push(Box::new(GuidedInitialization::new(
                self.toolbox.registration,
                self.toolbox.masks,
                self.toolbox.stats,
                self.toolbox.classifier,
                segmentation,
                self.config.tissue_classes,
                self.config.boundary_class,
                self.config.min_mask_voxels,
            )));
        }
        strategies.push(Box::new(CostMaskInitialization::new(
            self.toolbox.masks,
            self.toolbox.stats,
            structural_mask,
            self.config.cost_mask_erosion,
            self.config.min_mask_voxels,
        )));
        let initialization = InitializationSelector::new(strategies)
            .select(&ctx, options.initial_transform.as_ref());

        // 3. Staged registration, escalating to the emergency cascade when
        // the normal path cannot produce a verified artifact.
        let request = RegistrationRequest::new(fixed.clone(), moving.clone(), output_prefix)
            .with_initialization(initialization)
            .with_plan(StagePlan::full(self.config.restrict_deformation));
        let driver = StagedDriver::new(self.toolbox.registration);
        let outcome = match driver.register(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "staged registration failed, entering emergency cascade");
                let mut trail = DiagnosticTrail::new();
                trail.record("staged-driver", e.to_string());
                let cascade = EmergencyCascade::new(standard_methods(
                    self.toolbox.registration,
                    self.toolbox.linear_fallback,
                ));
                cascade.run(
                    &fixed,
                    &moving,
                    &workdir.join("emergency"),
                    output_prefix,
                    self.toolbox.volumes,
                    trail,
                )?
            }
        };
        info!(status = %outcome.status, "registration terminal");

        // 4. Quality, one report per attempt, even for failures.
        let assessor = QualityAssessor::new(
            self.toolbox.stats,
            self.config.quality.clone(),
            self.config.assume_acceptable_when_unmeasured,
        );
        let quality = assessor.assess(
            &fixed,
            &outcome.warped,
            None,
            outcome.transform.forward_warp(),
        );

        // 5. Persist reports next to the artifacts.
        let row = QualityCsvRow::from_report(&fixed, &moving, &quality);
        report::write_quality_csv(&artifact_path(output_prefix, "quality.csv"), &[row])?;
        report::write_outcome_summary(
            &artifact_path(output_prefix, "outcome.json"),
            &outcome,
            &quality,
        )?;
        outcome
            .trail
            .write_to(&artifact_path(output_prefix, "trail.txt"))?;

        Ok(PipelineRun {
            fixed,
            moving,
            outcome,
            quality,
            correction,
        })
    }

    /// Map a label atlas into the registered subject's space, producing
    /// per-region binary masks aligned with the *original* (uncorrected)
    /// input orientation.
    pub fn map_atlas(
        &self,
        atlas: &LabelAtlas,
        run: &PipelineRun,
        output_dir: &Path,
    ) -> Result<Vec<(AtlasRegion, Volume)>> {
        run.outcome.require_success()?;
        let application = TransformApplication::new(self.toolbox.resampler);
        let mapped = application.map_atlas_regions(
            atlas,
            &run.moving,
            &run.outcome.transform,
            self.toolbox.masks,
            output_dir,
        )?;

        let mut regions = Vec::with_capacity(mapped.len());
        for (region, mask) in mapped {
            let reversed = if run.correction.was_applied() {
                let name = mask
                    .path()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let native = output_dir.join(format!(
                    "{}_native.nii.gz",
                    name.trim_end_matches(".nii.gz")
                ));
                run.correction
                    .reverse(self.toolbox.volumes, &mask, &native)?
            } else {
                mask
            };
            regions.push((region, reversed));
        }
        Ok(regions)
    }

    fn probe_required(&self, path: &Path, kind: ContentKind) -> Result<Volume> {
        self.toolbox.volumes.probe(path, kind).map_err(|e| {
            PipelineError::input_invalid(format!("{}: {}", path.display(), e))
        })
    }

    fn probe_optional(&self, path: Option<&Path>) -> Option<Volume> {
        let path = path?;
        match self.toolbox.volumes.probe(path, ContentKind::Label) {
            Ok(volume) => Some(volume),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "optional mask unreadable, ignoring");
                None
            }
        }
    }
}
