//! The transform artifact model.
//!
//! The registration engine writes its components under a shared output
//! prefix using well-known suffixes. `TransformArtifact::discover` inspects
//! the filesystem exactly once, at the point the components were written;
//! everything downstream works from the typed artifact, never from renewed
//! filename sniffing.

use super::step::{MapDirection, TransformChain, TransformStep};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix of the linear (affine) component file.
pub const AFFINE_SUFFIX: &str = "0GenericAffine.mat";
/// Suffix of the nonlinear forward warp field.
pub const WARP_SUFFIX: &str = "1Warp.nii.gz";
/// Suffix of the nonlinear inverse warp field.
pub const INVERSE_WARP_SUFFIX: &str = "1InverseWarp.nii.gz";
/// Suffix of the canonical warped-volume artifact.
pub const WARPED_SUFFIX: &str = "Warped.nii.gz";

/// Join an output prefix with a component suffix.
///
/// Prefixes are path fragments, not directories: `/out/sub01_` +
/// `0GenericAffine.mat` = `/out/sub01_0GenericAffine.mat`.
pub fn artifact_path(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

/// Error resolving a transform chain from an artifact.
#[derive(Error, Debug)]
pub enum TransformChainError {
    /// No components at all were found under the prefix.
    #[error("no transform components found under prefix {prefix}")]
    Empty { prefix: String },

    /// A component needed for the requested direction is absent.
    #[error("transform under prefix {prefix} is missing its {component} component")]
    MissingComponent {
        prefix: String,
        component: &'static str,
    },

    /// The artifact came from a nonlinear stage but carries no warp field
    /// at all; applying it as linear-only would silently lose fidelity.
    #[error("nonlinear registration under prefix {prefix} produced no warp field")]
    MissingNonlinear { prefix: String },
}

/// A registration result: the components discovered under one output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformArtifact {
    prefix: PathBuf,
    linear: Option<PathBuf>,
    forward_warp: Option<PathBuf>,
    inverse_warp: Option<PathBuf>,
    nonlinear_expected: bool,
}

impl TransformArtifact {
    /// Scan the known component names under `prefix`.
    ///
    /// `nonlinear_expected` records whether the producing stage plan ended
    /// in a nonlinear stage; it arms the completeness invariant checked by
    /// `resolve` and `is_consistent`.
    pub fn discover(prefix: &Path, nonlinear_expected: bool) -> Self {
        let probe = |suffix: &str| {
            let path = artifact_path(prefix, suffix);
            path.is_file().then_some(path)
        };
        Self {
            prefix: prefix.to_path_buf(),
            linear: probe(AFFINE_SUFFIX),
            forward_warp: probe(WARP_SUFFIX),
            inverse_warp: probe(INVERSE_WARP_SUFFIX),
            nonlinear_expected,
        }
    }

    /// An artifact holding only a linear component (linear-only methods).
    pub fn linear_only(prefix: &Path, linear: PathBuf) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
            linear: Some(linear),
            forward_warp: None,
            inverse_warp: None,
            nonlinear_expected: false,
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn linear(&self) -> Option<&Path> {
        self.linear.as_deref()
    }

    pub fn forward_warp(&self) -> Option<&Path> {
        self.forward_warp.as_deref()
    }

    pub fn inverse_warp(&self) -> Option<&Path> {
        self.inverse_warp.as_deref()
    }

    pub fn nonlinear_expected(&self) -> bool {
        self.nonlinear_expected
    }

    /// Path of the canonical warped-volume artifact for this prefix.
    pub fn warped_path(&self) -> PathBuf {
        artifact_path(&self.prefix, WARPED_SUFFIX)
    }

    fn prefix_string(&self) -> String {
        self.prefix.display().to_string()
    }

    /// Whether the artifact satisfies its structural invariant: a nonlinear
    /// result must carry a linear component and at least one warp field.
    pub fn is_consistent(&self) -> bool {
        if !self.nonlinear_expected {
            return self.linear.is_some() || self.forward_warp.is_some();
        }
        self.linear.is_some() && (self.forward_warp.is_some() || self.inverse_warp.is_some())
    }

    /// Resolve the ordered application chain for a direction.
    ///
    /// Forward: linear first, then the forward warp. Inverse: the inverse
    /// warp first, then the inverted linear component; when only a forward
    /// warp exists the chain is marked approximate.
    pub fn resolve(&self, direction: MapDirection) -> Result<TransformChain, TransformChainError> {
        if self.linear.is_none() && self.forward_warp.is_none() && self.inverse_warp.is_none() {
            return Err(TransformChainError::Empty {
                prefix: self.prefix_string(),
            });
        }
        if self.nonlinear_expected {
            if self.forward_warp.is_none() && self.inverse_warp.is_none() {
                return Err(TransformChainError::MissingNonlinear {
                    prefix: self.prefix_string(),
                });
            }
            if self.linear.is_none() {
                return Err(TransformChainError::MissingComponent {
                    prefix: self.prefix_string(),
                    component: "linear",
                });
            }
        }

        match direction {
            MapDirection::Forward => {
                let mut steps = Vec::new();
                if let Some(linear) = &self.linear {
                    steps.push(TransformStep {
                        path: linear.clone(),
                        invert: false,
                    });
                }
                match (&self.forward_warp, self.nonlinear_expected) {
                    (Some(warp), _) => steps.push(TransformStep {
                        path: warp.clone(),
                        invert: false,
                    }),
                    (None, true) => {
                        return Err(TransformChainError::MissingComponent {
                            prefix: self.prefix_string(),
                            component: "forward warp",
                        })
                    }
                    (None, false) => {}
                }
                Ok(TransformChain::new(steps))
            }
            MapDirection::Inverse => {
                let linear_step = self.linear.as_ref().map(|linear| TransformStep {
                    path: linear.clone(),
                    invert: true,
                });
                if let Some(inverse) = &self.inverse_warp {
                    let mut steps = vec![TransformStep {
                        path: inverse.clone(),
                        invert: false,
                    }];
                    steps.extend(linear_step);
                    Ok(TransformChain::new(steps))
                } else if let Some(forward) = &self.forward_warp {
                    let mut steps = vec![TransformStep {
                        path: forward.clone(),
                        invert: false,
                    }];
                    steps.extend(linear_step);
                    Ok(TransformChain::approximate(steps))
                } else {
                    // Linear-only artifact; invert the matrix alone.
                    Ok(TransformChain::new(linear_step.into_iter().collect()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn full_artifact(dir: &Path) -> TransformArtifact {
        let prefix = dir.join("sub01_");
        touch(&artifact_path(&prefix, AFFINE_SUFFIX));
        touch(&artifact_path(&prefix, WARP_SUFFIX));
        touch(&artifact_path(&prefix, INVERSE_WARP_SUFFIX));
        TransformArtifact::discover(&prefix, true)
    }

    #[test]
    fn test_artifact_path_concatenates() {
        let p = artifact_path(Path::new("/out/sub01_"), AFFINE_SUFFIX);
        assert_eq!(p, PathBuf::from("/out/sub01_0GenericAffine.mat"));
    }

    #[test]
    fn test_discover_finds_components() {
        let dir = tempdir().unwrap();
        let artifact = full_artifact(dir.path());
        assert!(artifact.linear().is_some());
        assert!(artifact.forward_warp().is_some());
        assert!(artifact.inverse_warp().is_some());
        assert!(artifact.is_consistent());
    }

    #[test]
    fn test_discover_linear_only_after_nonlinear_is_inconsistent() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("sub01_");
        touch(&artifact_path(&prefix, AFFINE_SUFFIX));
        let artifact = TransformArtifact::discover(&prefix, true);
        assert!(!artifact.is_consistent());
        assert!(matches!(
            artifact.resolve(MapDirection::Forward),
            Err(TransformChainError::MissingNonlinear { .. })
        ));
    }

    #[test]
    fn test_forward_order_linear_then_warp() {
        let dir = tempdir().unwrap();
        let artifact = full_artifact(dir.path());
        let chain = artifact.resolve(MapDirection::Forward).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.steps[0].path.ends_with("sub01_0GenericAffine.mat"));
        assert!(!chain.steps[0].invert);
        assert!(chain.steps[1].path.ends_with("sub01_1Warp.nii.gz"));
        assert!(!chain.approximate);
    }

    #[test]
    fn test_inverse_order_warp_then_inverted_linear() {
        let dir = tempdir().unwrap();
        let artifact = full_artifact(dir.path());
        let chain = artifact.resolve(MapDirection::Inverse).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.steps[0].path.ends_with("sub01_1InverseWarp.nii.gz"));
        assert!(!chain.steps[0].invert);
        assert!(chain.steps[1].path.ends_with("sub01_0GenericAffine.mat"));
        assert!(chain.steps[1].invert);
        assert!(!chain.approximate);
    }

    #[test]
    fn test_inverse_without_inverse_warp_is_approximate() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("sub01_");
        touch(&artifact_path(&prefix, AFFINE_SUFFIX));
        touch(&artifact_path(&prefix, WARP_SUFFIX));
        let artifact = TransformArtifact::discover(&prefix, true);
        let chain = artifact.resolve(MapDirection::Inverse).unwrap();
        assert!(chain.approximate);
        assert!(chain.steps[0].path.ends_with("sub01_1Warp.nii.gz"));
        assert!(chain.steps[1].invert);
    }

    #[test]
    fn test_linear_only_inverse() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("lin_");
        let mat = artifact_path(&prefix, AFFINE_SUFFIX);
        touch(&mat);
        let artifact = TransformArtifact::linear_only(&prefix, mat);
        let chain = artifact.resolve(MapDirection::Inverse).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain.steps[0].invert);
        assert!(!chain.approximate);
    }

    #[test]
    fn test_empty_artifact_errors() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("none_");
        let artifact = TransformArtifact::discover(&prefix, false);
        assert!(matches!(
            artifact.resolve(MapDirection::Forward),
            Err(TransformChainError::Empty { .. })
        ));
    }
}
