//! Output verification and aliasing.
//!
//! The engine's output naming contract is documented but not always
//! honored; older releases and wrapper scripts emit a handful of variant
//! names. Verification accepts the canonical name, repairs a known variant
//! by aliasing it, and otherwise reports nothing found so recovery can
//! take over.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use volreg_core::transform::{artifact_path, WARPED_SUFFIX};

/// Warped-volume suffixes the engine is known to emit instead of the
/// canonical one.
pub const ALTERNATE_WARPED_SUFFIXES: &[&str] = &[
    "warped.nii.gz",
    "Warped.nii",
    "deformed.nii.gz",
    "WarpedToTemplate.nii.gz",
];

/// True when the file exists and has content.
pub fn artifact_nonempty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Verifies the warped artifact of a finished engine run.
#[derive(Debug, Clone, Default)]
pub struct OutputVerifier;

impl OutputVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Ensure the canonical warped artifact exists under `prefix`.
    ///
    /// Returns its path when found directly or repaired from an alternate
    /// name; `None` means the engine produced nothing usable and the
    /// caller must escalate.
    pub fn ensure_canonical(&self, prefix: &Path) -> Option<PathBuf> {
        let canonical = artifact_path(prefix, WARPED_SUFFIX);
        if artifact_nonempty(&canonical) {
            debug!(path = %canonical.display(), "canonical warped artifact present");
            return Some(canonical);
        }
        for suffix in ALTERNATE_WARPED_SUFFIXES {
            let variant = artifact_path(prefix, suffix);
            if artifact_nonempty(&variant) {
                info!(
                    found = %variant.display(),
                    canonical = %canonical.display(),
                    "warped artifact under alternate name, aliasing"
                );
                if fs::hard_link(&variant, &canonical).is_err() {
                    if let Err(e) = fs::copy(&variant, &canonical) {
                        debug!(error = %e, "aliasing failed");
                        return None;
                    }
                }
                return Some(canonical);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_canonical_accepted_as_is() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("p_");
        let canonical = artifact_path(&prefix, WARPED_SUFFIX);
        fs::write(&canonical, b"data").unwrap();
        let found = OutputVerifier::new().ensure_canonical(&prefix).unwrap();
        assert_eq!(found, canonical);
    }

    #[test]
    fn test_alternate_name_aliased() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("p_");
        let variant = artifact_path(&prefix, "deformed.nii.gz");
        fs::write(&variant, b"data").unwrap();

        let found = OutputVerifier::new().ensure_canonical(&prefix).unwrap();
        assert_eq!(found, artifact_path(&prefix, WARPED_SUFFIX));
        assert!(artifact_nonempty(&found));
        // the variant stays in place
        assert!(variant.is_file());
    }

    #[test]
    fn test_empty_file_not_accepted() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("p_");
        fs::write(artifact_path(&prefix, WARPED_SUFFIX), b"").unwrap();
        assert!(OutputVerifier::new().ensure_canonical(&prefix).is_none());
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("p_");
        assert!(OutputVerifier::new().ensure_canonical(&prefix).is_none());
    }
}
