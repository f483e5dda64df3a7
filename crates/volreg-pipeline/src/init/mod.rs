//! Initialization strategy selection.
//!
//! Strategies are tried in a fixed priority order; any failure inside a
//! tier degrades to the next one and is logged, never propagated. The
//! selector cannot fail: the final tier is always unguided.

mod cost_mask;
mod guided;
mod trait_;

pub use cost_mask::CostMaskInitialization;
pub use guided::GuidedInitialization;
pub use trait_::{InitializationContext, InitializationStrategy};

use std::path::PathBuf;
use tracing::{info, warn};
use volreg_core::Volume;

/// The starting point handed to the staged driver.
#[derive(Debug, Clone, PartialEq)]
pub enum InitializationPlan {
    /// Reuse an externally supplied transform file.
    Reuse { transform: PathBuf },
    /// Seed with the linear transform of a fast mask-guided
    /// sub-registration.
    GuidedByMask { mask: Volume, transform: PathBuf },
    /// Restrict the similarity metric to an eroded structural mask.
    CostMasked { mask: Volume },
    /// Let the engine start from its own coarse moments-based alignment.
    Unguided,
}

impl InitializationPlan {
    /// Name used in logs and diagnostic trails.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reuse { .. } => "reuse",
            Self::GuidedByMask { .. } => "guided-by-mask",
            Self::CostMasked { .. } => "cost-masked",
            Self::Unguided => "unguided",
        }
    }
}

/// Ordered strategy list with graceful degradation.
pub struct InitializationSelector<'a> {
    strategies: Vec<Box<dyn InitializationStrategy + 'a>>,
}

impl<'a> InitializationSelector<'a> {
    pub fn new(strategies: Vec<Box<dyn InitializationStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Pick the highest-priority viable plan.
    ///
    /// An externally supplied transform short-circuits every strategy.
    pub fn select(
        &self,
        ctx: &InitializationContext<'_>,
        supplied: Option<&PathBuf>,
    ) -> InitializationPlan {
        if let Some(transform) = supplied {
            if transform.is_file() {
                info!(transform = %transform.display(), "reusing supplied initialization transform");
                return InitializationPlan::Reuse {
                    transform: transform.clone(),
                };
            }
            warn!(
                transform = %transform.display(),
                "supplied initialization transform not found, falling through"
            );
        }
        for strategy in &self.strategies {
            match strategy.attempt(ctx) {
                Ok(plan) => {
                    info!(strategy = strategy.name(), plan = plan.name(), "initialization selected");
                    return plan;
                }
                Err(reason) => {
                    warn!(
                        strategy = strategy.name(),
                        reason = %reason,
                        "initialization tier degraded"
                    );
                }
            }
        }
        info!("no initialization tier viable, proceeding unguided");
        InitializationPlan::Unguided
    }
}
