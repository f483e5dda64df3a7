//! The standard fallback methods.
//!
//! Every method is the staged driver on a different plan and backend, so
//! artifact validation and stage seeding behave identically to the normal
//! path.

use super::trait_::{FallbackContext, FallbackMethod};
use crate::driver::{RegistrationRequest, StagedDriver};
use volreg_core::{StagePlan, TransformArtifact};
use volreg_engine::RegistrationBackend;

/// A fallback method that runs a stage plan through a backend in the
/// attempt's isolated workspace.
pub struct PlanFallback<'a> {
    name: &'static str,
    plan: StagePlan,
    backend: &'a dyn RegistrationBackend,
}

impl<'a> PlanFallback<'a> {
    pub fn new(name: &'static str, plan: StagePlan, backend: &'a dyn RegistrationBackend) -> Self {
        Self {
            name,
            plan,
            backend,
        }
    }
}

impl FallbackMethod for PlanFallback<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn attempt(&self, ctx: &FallbackContext<'_>) -> Result<TransformArtifact, String> {
        let prefix = ctx.workspace.join("reg_");
        let request = RegistrationRequest::new(ctx.fixed.clone(), ctx.moving.clone(), prefix)
            .with_plan(self.plan.clone());
        let driver = StagedDriver::new(self.backend);
        let outcome = driver.register(&request).map_err(|e| e.to_string())?;
        Ok(outcome.transform)
    }
}

/// The fixed method order: fast nonlinear, then the numerically stable
/// affine-only run, then a full default nonlinear pass, and finally the
/// independent linear tool.
pub fn standard_methods<'a>(
    primary: &'a dyn RegistrationBackend,
    linear_tool: &'a dyn RegistrationBackend,
) -> Vec<Box<dyn FallbackMethod + 'a>> {
    vec![
        Box::new(PlanFallback::new(
            "aggressive-nonlinear",
            StagePlan::aggressive_nonlinear(),
            primary,
        )),
        Box::new(PlanFallback::new(
            "affine-only",
            StagePlan::affine_only(),
            primary,
        )),
        Box::new(PlanFallback::new(
            "standard-nonlinear",
            StagePlan::full(None),
            primary,
        )),
        Box::new(PlanFallback::new(
            "linear-only",
            StagePlan::affine_only(),
            linear_tool,
        )),
    ]
}
