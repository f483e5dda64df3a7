//! Grid geometry and coordinate-system metadata of a volume.

use crate::orientation::{FrameCode, OrientationCode};
use serde::{Deserialize, Serialize};

/// Physical-space metadata of a volume: grid shape, voxel spacing, the
/// anatomical orientation of the voxel axes, and the two reference-frame
/// annotations carried by the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGeometry {
    /// Voxel counts per storage axis.
    pub dims: [usize; 3],
    /// Physical distance between voxels along each axis, in mm.
    pub spacing: [f64; 3],
    /// Anatomical orientation of the voxel axes.
    pub orientation: OrientationCode,
    /// Scanner-side reference-frame annotation.
    pub qform: FrameCode,
    /// Aligned-side reference-frame annotation.
    pub sform: FrameCode,
}

impl VolumeGeometry {
    pub fn new(
        dims: [usize; 3],
        spacing: [f64; 3],
        orientation: OrientationCode,
        qform: FrameCode,
        sform: FrameCode,
    ) -> Self {
        Self {
            dims,
            spacing,
            orientation,
            qform,
            sform,
        }
    }

    /// Volume of a single voxel in mm³.
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Total voxel count of the grid.
    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// The authoritative frame code: the aligned-side annotation when set,
    /// otherwise the scanner-side one.
    pub fn frame(&self) -> FrameCode {
        if self.sform != FrameCode::Unknown {
            self.sform
        } else {
            self.qform
        }
    }

    /// True when the two geometries describe the same grid (dims equal,
    /// spacing equal within tolerance).
    pub fn matches_grid(&self, other: &Self) -> bool {
        self.dims == other.dims
            && self
                .spacing
                .iter()
                .zip(other.spacing.iter())
                .all(|(a, b)| (a - b).abs() < 1e-4)
    }
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            dims: [0, 0, 0],
            spacing: [1.0, 1.0, 1.0],
            orientation: OrientationCode::RAS,
            qform: FrameCode::Unknown,
            sform: FrameCode::Unknown,
        }
    }
}
