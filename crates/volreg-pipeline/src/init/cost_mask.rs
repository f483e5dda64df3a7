//! Cost-function mask initialization.

use super::trait_::{InitializationContext, InitializationStrategy};
use super::InitializationPlan;
use volreg_core::Volume;
use volreg_engine::{ImageStats, MaskOps};

/// Second tier: erode the structural mask so boundary voxels stop driving
/// the metric, and sanity-check its size before trusting it.
pub struct CostMaskInitialization<'a> {
    masks: &'a dyn MaskOps,
    stats: &'a dyn ImageStats,
    structural_mask: Option<Volume>,
    erosion: usize,
    min_mask_voxels: usize,
}

impl<'a> CostMaskInitialization<'a> {
    pub fn new(
        masks: &'a dyn MaskOps,
        stats: &'a dyn ImageStats,
        structural_mask: Option<Volume>,
        erosion: usize,
        min_mask_voxels: usize,
    ) -> Self {
        Self {
            masks,
            stats,
            structural_mask,
            erosion,
            min_mask_voxels,
        }
    }
}

impl InitializationStrategy for CostMaskInitialization<'_> {
    fn name(&self) -> &str {
        "cost-masked"
    }

    fn attempt(&self, ctx: &InitializationContext<'_>) -> Result<InitializationPlan, String> {
        let structural = self
            .structural_mask
            .as_ref()
            .ok_or_else(|| "no structural mask supplied".to_string())?;

        let eroded = self
            .masks
            .erode(
                structural,
                self.erosion,
                &ctx.workdir.join("cost_mask_eroded.nii.gz"),
            )
            .map_err(|e| format!("mask erosion failed: {}", e))?;

        let voxels = self
            .stats
            .stats(&eroded)
            .map_err(|e| format!("mask statistics failed: {}", e))?
            .nonzero_voxels;
        if voxels < self.min_mask_voxels {
            return Err(format!(
                "eroded cost mask too small: {} voxels < {}",
                voxels, self.min_mask_voxels
            ));
        }

        Ok(InitializationPlan::CostMasked { mask: eroded })
    }
}
