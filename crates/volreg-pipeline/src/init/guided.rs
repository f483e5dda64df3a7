//! Guided initialization: tissue-boundary mask plus a fast linear
//! sub-registration.

use super::trait_::{InitializationContext, InitializationStrategy};
use super::InitializationPlan;
use volreg_core::transform::{artifact_path, AFFINE_SUFFIX};
use volreg_core::{StagePlan, TransformArtifact, Volume};
use volreg_engine::{
    ImageStats, MaskOps, RegistrationBackend, RegistrationJob, TissueClassifier,
};

/// Highest-priority tier: derive a tissue-boundary mask and run a fast
/// rigid sub-registration restricted to it. The resulting linear transform
/// seeds the main registration.
pub struct GuidedInitialization<'a> {
    backend: &'a dyn RegistrationBackend,
    masks: &'a dyn MaskOps,
    stats: &'a dyn ImageStats,
    classifier: Option<&'a dyn TissueClassifier>,
    /// Pre-existing segmentation of the fixed volume, when upstream
    /// produced one.
    segmentation: Option<Volume>,
    tissue_classes: usize,
    boundary_class: u32,
    min_mask_voxels: usize,
}

impl<'a> GuidedInitialization<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: &'a dyn RegistrationBackend,
        masks: &'a dyn MaskOps,
        stats: &'a dyn ImageStats,
        classifier: Option<&'a dyn TissueClassifier>,
        segmentation: Option<Volume>,
        tissue_classes: usize,
        boundary_class: u32,
        min_mask_voxels: usize,
    ) -> Self {
        Self {
            backend,
            masks,
            stats,
            classifier,
            segmentation,
            tissue_classes,
            boundary_class,
            min_mask_voxels,
        }
    }

    fn boundary_mask(&self, ctx: &InitializationContext<'_>) -> Result<Volume, String> {
        let segmentation = match &self.segmentation {
            Some(existing) => existing.clone(),
            None => {
                let classifier = self
                    .classifier
                    .ok_or_else(|| "no segmentation and no tissue classifier available".to_string())?;
                classifier
                    .classify(
                        ctx.fixed,
                        self.tissue_classes,
                        &ctx.workdir.join("guided_tissue_"),
                    )
                    .map_err(|e| format!("tissue classification failed: {}", e))?
            }
        };
        let class = self.boundary_class as f64;
        self.masks
            .threshold_band(
                &segmentation,
                class,
                class,
                &ctx.workdir.join("guided_boundary_mask.nii.gz"),
            )
            .map_err(|e| format!("boundary mask extraction failed: {}", e))
    }
}

impl InitializationStrategy for GuidedInitialization<'_> {
    fn name(&self) -> &str {
        "guided-by-mask"
    }

    fn attempt(&self, ctx: &InitializationContext<'_>) -> Result<InitializationPlan, String> {
        let mask = self.boundary_mask(ctx)?;

        let voxels = self
            .stats
            .stats(&mask)
            .map_err(|e| format!("mask statistics failed: {}", e))?
            .nonzero_voxels;
        if voxels < self.min_mask_voxels {
            return Err(format!(
                "boundary mask too small: {} voxels < {}",
                voxels, self.min_mask_voxels
            ));
        }

        let prefix = ctx.workdir.join("guided_init_");
        let plan = StagePlan::rigid_fast();
        let stage = &plan.stages()[0];
        let job = RegistrationJob {
            fixed: ctx.fixed,
            moving: ctx.moving,
            output_prefix: &prefix,
            stage,
            initial_transform: None,
            fixed_mask: Some(&mask),
        };
        self.backend
            .run_stage(&job)
            .map_err(|e| format!("guided sub-registration failed: {}", e))?;

        let artifact = TransformArtifact::discover(&prefix, false);
        let transform = artifact
            .linear()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| {
                format!(
                    "guided sub-registration produced no linear transform at {}",
                    artifact_path(&prefix, AFFINE_SUFFIX).display()
                )
            })?;

        Ok(InitializationPlan::GuidedByMask { mask, transform })
    }
}
