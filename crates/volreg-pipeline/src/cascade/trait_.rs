//! Attempt interface for fallback methods.

use std::path::Path;
use volreg_core::{TransformArtifact, Volume};

/// Shared inputs for one fallback attempt.
#[derive(Debug, Clone)]
pub struct FallbackContext<'a> {
    pub fixed: &'a Volume,
    pub moving: &'a Volume,
    /// Isolated directory owned by this attempt alone.
    pub workspace: &'a Path,
}

/// One method in the cascade.
///
/// `Err` carries the failure reason for the diagnostic trail; the cascade
/// moves on to the next method.
pub trait FallbackMethod {
    fn name(&self) -> &str;

    fn attempt(&self, ctx: &FallbackContext<'_>) -> Result<TransformArtifact, String>;
}
