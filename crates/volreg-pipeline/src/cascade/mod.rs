//! Emergency fallback cascade.
//!
//! A fixed, ordered list of progressively simpler registration attempts,
//! each in its own isolated subdirectory so partial files never collide.
//! The cascade stops at the first validated artifact; exhaustion writes an
//! explicit placeholder and surfaces `Failed`, never a fabricated success.

mod methods;
mod trait_;

pub use methods::{standard_methods, PlanFallback};
pub use trait_::{FallbackContext, FallbackMethod};

use crate::error::Result;
use crate::outcome::{DiagnosticTrail, RegistrationOutcome};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};
use volreg_core::transform::{artifact_path, WARPED_SUFFIX};
use volreg_core::{TransformArtifact, Volume};
use volreg_engine::VolumeOps;

/// Ordered fallback methods sharing one attempt interface.
pub struct EmergencyCascade<'a> {
    methods: Vec<Box<dyn FallbackMethod + 'a>>,
}

impl<'a> EmergencyCascade<'a> {
    pub fn new(methods: Vec<Box<dyn FallbackMethod + 'a>>) -> Self {
        Self { methods }
    }

    /// Run the cascade inside `workspace`, publishing the winner's warped
    /// volume under `output_prefix`'s canonical name.
    ///
    /// `trail` carries whatever the normal path already recorded; every
    /// attempt here is appended to it.
    pub fn run(
        &self,
        fixed: &Volume,
        moving: &Volume,
        workspace: &Path,
        output_prefix: &Path,
        volumes: &dyn VolumeOps,
        mut trail: DiagnosticTrail,
    ) -> Result<RegistrationOutcome> {
        fs::create_dir_all(workspace)?;
        let canonical = artifact_path(output_prefix, WARPED_SUFFIX);

        for method in &self.methods {
            info!(method = method.name(), "attempting fallback registration");
            let subdir = workspace.join(method.name());
            if let Err(e) = fs::create_dir_all(&subdir) {
                warn!(method = method.name(), error = %e, "cannot create fallback workspace");
                trail.record(method.name(), format!("workspace creation failed: {}", e));
                continue;
            }
            let ctx = FallbackContext {
                fixed,
                moving,
                workspace: &subdir,
            };
            match method.attempt(&ctx) {
                Ok(artifact) => {
                    info!(method = method.name(), "fallback registration succeeded");
                    trail.record(method.name(), "succeeded");
                    fs::copy(artifact.warped_path(), &canonical)?;
                    let warped =
                        Volume::new(&canonical, fixed.geometry().clone(), moving.kind());
                    return Ok(RegistrationOutcome::recovered(
                        method.name(),
                        warped,
                        artifact,
                        trail,
                    ));
                }
                Err(reason) => {
                    warn!(method = method.name(), reason = %reason, "fallback method failed");
                    trail.record(method.name(), reason);
                }
            }
        }

        error!(
            prefix = %output_prefix.display(),
            attempts = trail.len(),
            "all fallback methods exhausted, writing placeholder"
        );
        let placeholder = volumes.write_placeholder(fixed, &canonical)?;
        let artifact = TransformArtifact::discover(output_prefix, false);
        Ok(RegistrationOutcome::failed(placeholder, artifact, trail))
    }
}
