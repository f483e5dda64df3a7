//! Resolved transform chains.

use std::path::PathBuf;

/// Direction a transform artifact is applied in.
///
/// Forward maps moving-space data onto the fixed grid; inverse maps
/// fixed-space data (templates, atlases) back onto the moving grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDirection {
    Forward,
    Inverse,
}

/// One component of a resolved chain, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStep {
    pub path: PathBuf,
    /// Invert this component when applying (only meaningful for the linear
    /// component; warp fields ship an explicit inverse file instead).
    pub invert: bool,
}

/// Ordered transform components ready for a resampler.
///
/// `steps` is in application order: `steps[0]` acts on the source first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformChain {
    pub steps: Vec<TransformStep>,
    /// Set when an inverse-direction request had to fall back to the
    /// forward warp because no explicit inverse exists. The result is an
    /// approximation and must be surfaced as a warning.
    pub approximate: bool,
}

impl TransformChain {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self {
            steps,
            approximate: false,
        }
    }

    pub fn approximate(steps: Vec<TransformStep>) -> Self {
        Self {
            steps,
            approximate: true,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
