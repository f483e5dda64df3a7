//! Strategy interface for initialization tiers.

use super::InitializationPlan;
use std::path::Path;
use volreg_core::Volume;

/// Shared inputs for all initialization attempts.
#[derive(Debug, Clone)]
pub struct InitializationContext<'a> {
    pub fixed: &'a Volume,
    pub moving: &'a Volume,
    /// Scratch directory owned by this request.
    pub workdir: &'a Path,
}

/// One tier in the priority list.
///
/// An `Err` is a degradation reason, not a pipeline error: the selector
/// logs it and moves to the next tier.
pub trait InitializationStrategy {
    fn name(&self) -> &str;

    fn attempt(&self, ctx: &InitializationContext<'_>) -> Result<InitializationPlan, String>;
}
