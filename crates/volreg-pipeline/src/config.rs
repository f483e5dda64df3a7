//! Pipeline configuration.
//!
//! One immutable struct passed into each component; there is no ambient or
//! environment-variable state. Defaults match the standard clinical runs;
//! everything is overridable programmatically or from a TOML file.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Grade cut-offs, as (overlap, correlation) pairs per tier. A candidate
/// earns a tier by exceeding either value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub excellent_overlap: f64,
    pub excellent_correlation: f64,
    pub good_overlap: f64,
    pub good_correlation: f64,
    pub acceptable_overlap: f64,
    pub acceptable_correlation: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent_overlap: 0.8,
            excellent_correlation: 0.7,
            good_overlap: 0.7,
            good_correlation: 0.6,
            acceptable_overlap: 0.5,
            acceptable_correlation: 0.4,
        }
    }
}

impl QualityThresholds {
    fn validate(&self) -> Result<()> {
        let ordered = self.excellent_overlap > self.good_overlap
            && self.good_overlap > self.acceptable_overlap
            && self.excellent_correlation > self.good_correlation
            && self.good_correlation > self.acceptable_correlation;
        if !ordered {
            return Err(PipelineError::invalid_configuration(
                "quality thresholds must strictly decrease from excellent to acceptable",
            ));
        }
        Ok(())
    }
}

/// Immutable configuration for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Try the guided (tissue-boundary mask) initialization tier.
    pub use_guided_initialization: bool,
    /// Classes requested from the tissue classifier when no segmentation
    /// exists.
    pub tissue_classes: usize,
    /// Class index treated as the tissue boundary for guided masks.
    pub boundary_class: u32,
    /// Minimum voxel count for any initialization mask to be trusted.
    pub min_mask_voxels: usize,
    /// Erosion iterations applied to the structural mask before it becomes
    /// a cost-function mask.
    pub cost_mask_erosion: usize,
    /// Per-axis deformation restriction for the nonlinear stage; `false`
    /// freezes that axis.
    pub restrict_deformation: Option<[bool; 3]>,
    /// When no quality metric can be computed, substitute the acceptable
    /// tier's correlation value in reports instead of leaving them empty.
    /// The substitution is an assumption and is logged as one.
    pub assume_acceptable_when_unmeasured: bool,
    pub quality: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_guided_initialization: false,
            tissue_classes: 3,
            boundary_class: 2,
            min_mask_voxels: 250,
            cost_mask_erosion: 1,
            restrict_deformation: None,
            assume_acceptable_when_unmeasured: true,
            quality: QualityThresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guided_initialization(mut self, enabled: bool) -> Self {
        self.use_guided_initialization = enabled;
        self
    }

    pub fn with_min_mask_voxels(mut self, voxels: usize) -> Self {
        self.min_mask_voxels = voxels;
        self
    }

    pub fn with_restricted_deformation(mut self, restrict: [bool; 3]) -> Self {
        self.restrict_deformation = Some(restrict);
        self
    }

    pub fn with_quality_thresholds(mut self, quality: QualityThresholds) -> Self {
        self.quality = quality;
        self
    }

    /// Disable the assumed-acceptable substitution: unmeasurable quality
    /// stays empty in reports.
    pub fn without_assumed_quality(mut self) -> Self {
        self.assume_acceptable_when_unmeasured = false;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PipelineError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tissue_classes < 2 {
            return Err(PipelineError::invalid_configuration(
                "tissue classification needs at least 2 classes",
            ));
        }
        if self.min_mask_voxels == 0 {
            return Err(PipelineError::invalid_configuration(
                "minimum mask voxel count must be positive",
            ));
        }
        self.quality.validate()
    }
}
