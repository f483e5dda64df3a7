//! Coordinate-system reconciliation.
//!
//! Before any transform between two volumes is trusted, their orientation
//! and reference-frame metadata must agree. The reconciler corrects the
//! moving volume best-effort and hands back a correction record whose
//! `reverse` is derived mechanically from the forward operations, so label
//! maps computed in corrected space can be returned to the original input
//! orientation without a second hand-maintained code path.

use crate::error::Result;
use std::path::Path;
use tracing::{info, warn};
use volreg_core::{FrameCode, FrameFamily, OrientationCode, Volume};
use volreg_engine::VolumeOps;

/// How badly two volumes' coordinate metadata disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchSeverity {
    /// Metadata agrees; nothing to do.
    None,
    /// Same coordinate convention, different axis storage (handedness or
    /// permutation).
    Cosmetic,
    /// Genuinely different anatomical conventions (subject-native vs
    /// standard-template).
    Critical,
}

/// One recorded correction operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrientOp {
    /// Voxel axes were remapped into this orientation.
    Remap(OrientationCode),
    /// The left/right axis was reversed.
    FlipHandedness,
    /// Frame codes were overwritten.
    Retag { qform: FrameCode, sform: FrameCode },
}

/// Record of what reconciliation changed on the moving volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationCorrection {
    applied: bool,
    forward: Vec<OrientOp>,
    /// Orientation the moving input arrived in.
    original_orientation: OrientationCode,
}

impl OrientationCorrection {
    /// A correction that changed nothing.
    pub fn not_applied(original_orientation: OrientationCode) -> Self {
        Self {
            applied: false,
            forward: Vec::new(),
            original_orientation,
        }
    }

    pub fn was_applied(&self) -> bool {
        self.applied
    }

    pub fn operations(&self) -> &[OrientOp] {
        &self.forward
    }

    pub fn original_orientation(&self) -> OrientationCode {
        self.original_orientation
    }

    /// The operations `reverse` will perform, derived mechanically from
    /// the recorded forward operations. Re-tagging and the geometry copy
    /// are never reversed; only the axis/handedness change is.
    pub fn inverse_operations(&self) -> Vec<OrientOp> {
        self.forward
            .iter()
            .rev()
            .filter_map(|op| match op {
                OrientOp::Remap(_) => Some(OrientOp::Remap(self.original_orientation)),
                OrientOp::FlipHandedness => Some(OrientOp::FlipHandedness),
                OrientOp::Retag { .. } => None,
            })
            .collect()
    }

    /// Map a label volume computed in corrected space back to the original
    /// input orientation.
    ///
    /// Only the axis/handedness operation is reversed, never the geometry
    /// copy or the frame-code re-tagging. Idempotent: a volume already in
    /// the original orientation passes through untouched.
    pub fn reverse(
        &self,
        volumes: &dyn VolumeOps,
        label: &Volume,
        output: &Path,
    ) -> Result<Volume> {
        if !self.applied {
            return Ok(label.clone());
        }
        if label.geometry().orientation == self.original_orientation {
            return Ok(label.clone());
        }
        let reversed = volumes.reorient(label, self.original_orientation, output)?;
        Ok(reversed)
    }
}

/// Inspects and repairs coordinate metadata between a reference and a
/// moving volume.
pub struct CoordinateReconciler<'a> {
    volumes: &'a dyn VolumeOps,
}

impl<'a> CoordinateReconciler<'a> {
    pub fn new(volumes: &'a dyn VolumeOps) -> Self {
        Self { volumes }
    }

    /// Classify the disagreement between two volumes' metadata.
    pub fn classify(&self, reference: &Volume, moving: &Volume) -> MismatchSeverity {
        let ref_family = reference.geometry().frame().family();
        let mov_family = moving.geometry().frame().family();
        let families_known =
            ref_family != FrameFamily::Unspecified && mov_family != FrameFamily::Unspecified;
        if families_known && ref_family != mov_family {
            return MismatchSeverity::Critical;
        }
        if reference.geometry().orientation != moving.geometry().orientation {
            return MismatchSeverity::Cosmetic;
        }
        MismatchSeverity::None
    }

    /// Correct `moving` to match `reference`'s coordinate metadata.
    ///
    /// Returns the corrected volume (possibly `moving` unchanged) plus the
    /// correction record. Verification failures degrade to warnings; the
    /// pipeline is never blocked on metadata repair.
    pub fn reconcile(
        &self,
        reference: &Volume,
        moving: &Volume,
        workdir: &Path,
    ) -> Result<(Volume, OrientationCorrection)> {
        let original_orientation = moving.geometry().orientation;
        let severity = self.classify(reference, moving);
        let target = reference.geometry().orientation;

        let (corrected, forward) = match severity {
            MismatchSeverity::None => {
                return Ok((
                    moving.clone(),
                    OrientationCorrection::not_applied(original_orientation),
                ))
            }
            MismatchSeverity::Cosmetic => {
                info!(
                    moving = %moving.id(),
                    current = %original_orientation,
                    target = %target,
                    "cosmetic orientation mismatch, remapping axes"
                );
                let mut ops = Vec::new();
                let corrected = if moving.geometry().orientation.same_axes(&target) {
                    ops.push(OrientOp::FlipHandedness);
                    self.volumes
                        .flip_handedness(moving, &workdir.join("moving_flipped.nii.gz"))?
                } else {
                    ops.push(OrientOp::Remap(target));
                    self.volumes
                        .reorient(moving, target, &workdir.join("moving_reoriented.nii.gz"))?
                };
                (corrected, ops)
            }
            MismatchSeverity::Critical => {
                warn!(
                    reference_frame = %reference.geometry().frame(),
                    moving_frame = %moving.geometry().frame(),
                    "critical reference-frame mismatch, rewriting moving volume metadata"
                );
                let mut ops = Vec::new();
                let mut corrected = self.volumes.reorient(
                    moving,
                    target,
                    &workdir.join("moving_reoriented.nii.gz"),
                )?;
                ops.push(OrientOp::Remap(target));

                corrected = self.volumes.set_frame_codes(
                    &corrected,
                    reference.geometry().qform,
                    reference.geometry().sform,
                    &workdir.join("moving_retagged.nii.gz"),
                )?;
                ops.push(OrientOp::Retag {
                    qform: reference.geometry().qform,
                    sform: reference.geometry().sform,
                });

                if corrected.geometry().orientation != target {
                    corrected = self
                        .volumes
                        .flip_handedness(&corrected, &workdir.join("moving_flipped.nii.gz"))?;
                    ops.push(OrientOp::FlipHandedness);
                }

                if corrected.geometry().dims == reference.geometry().dims {
                    corrected = self.volumes.copy_geometry(
                        reference,
                        &corrected,
                        &workdir.join("moving_regridded.nii.gz"),
                    )?;
                } else {
                    warn!(
                        moving_dims = ?corrected.geometry().dims,
                        reference_dims = ?reference.geometry().dims,
                        "grids differ, skipping geometry copy"
                    );
                }
                (corrected, ops)
            }
        };

        // Best-effort verification; an incomplete match degrades analysis
        // but does not stop the pipeline.
        if corrected.geometry().orientation != target {
            warn!(
                got = %corrected.geometry().orientation,
                want = %target,
                "orientation correction incomplete"
            );
        }
        if severity == MismatchSeverity::Critical
            && corrected.geometry().frame() != reference.geometry().frame()
        {
            warn!("frame-code correction incomplete");
        }

        Ok((
            corrected,
            OrientationCorrection {
                applied: true,
                forward,
                original_orientation,
            },
        ))
    }
}
