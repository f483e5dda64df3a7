//! Ports to the external collaborators.
//!
//! Every capability the orchestrator consumes from outside is a trait here,
//! so the pipeline can be exercised against in-memory fakes and the
//! production adapters stay interchangeable.

use crate::error::Result;
use std::path::Path;
use volreg_core::{
    ContentKind, FrameCode, Interpolation, OrientationCode, StageSpec, TransformChain, Volume,
};

/// One staged invocation of the registration engine.
///
/// The engine writes its warped volume and transform components under
/// `output_prefix` using the shared naming contract and reports success or
/// failure through its exit status.
#[derive(Debug, Clone)]
pub struct RegistrationJob<'a> {
    pub fixed: &'a Volume,
    pub moving: &'a Volume,
    pub output_prefix: &'a Path,
    pub stage: &'a StageSpec,
    /// Seeds the stage; absent means the engine's own coarse moments-based
    /// alignment.
    pub initial_transform: Option<&'a Path>,
    /// Cost-function mask restricting which voxels drive the metric.
    pub fixed_mask: Option<&'a Volume>,
}

/// The registration engine proper.
pub trait RegistrationBackend {
    /// Tool name for logs and diagnostic trails.
    fn name(&self) -> &str;

    /// Run one stage to completion. Success of the process does not imply
    /// the expected artifacts exist; callers verify separately.
    fn run_stage(&self, job: &RegistrationJob<'_>) -> Result<()>;
}

/// Resampling through a resolved transform chain.
pub trait Resampler {
    /// Resample `source` onto `reference`'s grid through `chain`, writing
    /// the result to `output`.
    fn resample(
        &self,
        source: &Volume,
        reference: &Volume,
        chain: &TransformChain,
        interpolation: Interpolation,
        output: &Path,
    ) -> Result<Volume>;
}

/// Scalar statistics of one volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub nonzero_voxels: usize,
}

/// Volumetric agreement between two binary masks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapStats {
    pub jaccard: f64,
    pub dice: f64,
}

/// Displacement statistics of a warp field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpStats {
    /// Mean displacement magnitude, mm.
    pub mean_displacement: f64,
    /// Maximum displacement magnitude, mm.
    pub max_displacement: f64,
    /// Standard deviation of displacement magnitudes.
    pub variability: f64,
}

/// Image-statistics utility.
pub trait ImageStats {
    fn stats(&self, volume: &Volume) -> Result<IntensityStats>;

    /// Pearson correlation between two same-grid volumes.
    fn correlation(&self, a: &Volume, b: &Volume) -> Result<f64>;

    /// Mutual information between two same-grid volumes.
    fn mutual_information(&self, a: &Volume, b: &Volume) -> Result<f64>;

    /// Normalized cross-correlation between two same-grid volumes.
    fn normalized_cross_correlation(&self, a: &Volume, b: &Volume) -> Result<f64>;

    /// Overlap between two binary masks on the same grid.
    fn overlap(&self, a: &Volume, b: &Volume) -> Result<OverlapStats>;

    /// Distinct label values present in a categorical volume.
    fn label_values(&self, volume: &Volume) -> Result<Vec<u32>>;

    /// Displacement statistics of a warp-field volume.
    fn warp_statistics(&self, warp: &Path) -> Result<WarpStats>;
}

/// Volume metadata probing and orientation surgery.
///
/// Every operation that produces a volume writes a new file; inputs are
/// never modified.
pub trait VolumeOps {
    /// Read a volume's geometry from its header.
    fn probe(&self, path: &Path, kind: ContentKind) -> Result<Volume>;

    /// Rewrite with voxel axes permuted/flipped into `target` orientation.
    fn reorient(&self, volume: &Volume, target: OrientationCode, output: &Path) -> Result<Volume>;

    /// Rewrite with the left/right axis reversed.
    fn flip_handedness(&self, volume: &Volume, output: &Path) -> Result<Volume>;

    /// Rewrite with the reference-frame annotations replaced.
    fn set_frame_codes(
        &self,
        volume: &Volume,
        qform: FrameCode,
        sform: FrameCode,
        output: &Path,
    ) -> Result<Volume>;

    /// Rewrite `volume`'s data under `reference`'s full geometry. Grids
    /// must agree in voxel counts.
    fn copy_geometry(&self, reference: &Volume, volume: &Volume, output: &Path) -> Result<Volume>;

    /// Write an all-zero volume on `grid`'s grid. Used as the explicit
    /// placeholder artifact of a terminally failed registration.
    fn write_placeholder(&self, grid: &Volume, output: &Path) -> Result<Volume>;
}

/// Mask algebra.
pub trait MaskOps {
    /// Binary-erode a mask the given number of iterations.
    fn erode(&self, mask: &Volume, iterations: usize, output: &Path) -> Result<Volume>;

    /// Keep voxels with values in `[low, high]` as 1, zero elsewhere.
    fn threshold_band(&self, volume: &Volume, low: f64, high: f64, output: &Path) -> Result<Volume>;

    /// Map all positive voxels to 1.
    fn binarize(&self, volume: &Volume, output: &Path) -> Result<Volume>;
}

/// Optional rough tissue segmentation.
///
/// Failure here is an expected degradation path, never a pipeline error.
pub trait TissueClassifier {
    /// Produce a `classes`-class label volume for `volume`, writing under
    /// `output_prefix`.
    fn classify(&self, volume: &Volume, classes: usize, output_prefix: &Path) -> Result<Volume>;
}
