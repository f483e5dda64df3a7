//! The `Volume` reference type.
//!
//! A `Volume` is an immutable handle to on-disk volumetric data plus the
//! metadata the orchestrator needs to reason about it. Operations never
//! mutate a volume in place; they produce new files and new handles.

use super::VolumeGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What kind of values the voxels hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    /// Continuous intensities (anatomical scans, probability maps).
    Continuous,
    /// Discrete region identifiers (atlases, segmentation masks).
    Label,
}

/// Resampling interpolation mode.
///
/// Chosen from the content kind: label volumes must never have their values
/// blended, so they always resample nearest-neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    NearestNeighbor,
}

impl Interpolation {
    /// The interpolation mode appropriate for a content kind.
    pub fn for_content(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Continuous => Self::Linear,
            ContentKind::Label => Self::NearestNeighbor,
        }
    }
}

/// Immutable reference to a volumetric image on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    path: PathBuf,
    geometry: VolumeGeometry,
    kind: ContentKind,
}

impl Volume {
    pub fn new(path: impl Into<PathBuf>, geometry: VolumeGeometry, kind: ContentKind) -> Self {
        Self {
            path: path.into(),
            geometry,
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn is_label(&self) -> bool {
        self.kind == ContentKind::Label
    }

    /// Short identifier for logs and reports: the file stem without
    /// compression suffixes.
    pub fn id(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.trim_end_matches(".gz")
            .trim_end_matches(".nii")
            .to_string()
    }

    /// A handle to the same data under a different path (aliases, copies).
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            geometry: self.geometry.clone(),
            kind: self.kind,
        }
    }

    /// A handle with updated geometry (after reorientation or re-tagging).
    pub fn with_geometry(&self, geometry: VolumeGeometry) -> Self {
        Self {
            path: self.path.clone(),
            geometry,
            kind: self.kind,
        }
    }
}
