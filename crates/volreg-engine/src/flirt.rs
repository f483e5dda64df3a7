//! FLIRT adapter: the independent linear-only fallback tool.
//!
//! Deliberately simpler than the primary backend. It only handles rigid and
//! affine stages; the adapter normalizes its outputs onto the shared
//! artifact naming contract so discovery works unchanged.

use crate::error::{EngineError, Result};
use crate::process::run_tool;
use crate::traits::{RegistrationBackend, RegistrationJob};
use std::process::Command;
use volreg_core::transform::{artifact_path, AFFINE_SUFFIX, WARPED_SUFFIX};
use volreg_core::StageKind;

/// `flirt` invocation.
#[derive(Debug, Clone)]
pub struct FlirtLinear {
    executable: String,
}

impl Default for FlirtLinear {
    fn default() -> Self {
        Self {
            executable: "flirt".to_string(),
        }
    }
}

impl FlirtLinear {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }
}

impl RegistrationBackend for FlirtLinear {
    fn name(&self) -> &str {
        "flirt"
    }

    fn run_stage(&self, job: &RegistrationJob<'_>) -> Result<()> {
        let dof = match job.stage.kind {
            StageKind::Rigid => 6,
            StageKind::Affine => 12,
            StageKind::Diffeomorphic => {
                return Err(EngineError::unsupported(
                    "flirt cannot run nonlinear stages",
                ))
            }
        };
        let warped = artifact_path(job.output_prefix, WARPED_SUFFIX);
        let matrix = artifact_path(job.output_prefix, AFFINE_SUFFIX);
        let mut command = Command::new(&self.executable);
        command.args([
            "-in",
            &job.moving.path().display().to_string(),
            "-ref",
            &job.fixed.path().display().to_string(),
            "-out",
            &warped.display().to_string(),
            "-omat",
            &matrix.display().to_string(),
            "-dof",
            &dof.to_string(),
            "-cost",
            "mutualinfo",
        ]);
        if let Some(init) = job.initial_transform {
            command.args(["-init", &init.display().to_string()]);
        }
        if let Some(mask) = job.fixed_mask {
            command.args(["-refweight", &mask.path().display().to_string()]);
        }
        run_tool(command, &self.executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use volreg_core::{ContentKind, StageSpec, Volume, VolumeGeometry};

    #[test]
    fn test_nonlinear_stage_rejected() {
        let fixed = Volume::new(
            "/d/fixed.nii.gz",
            VolumeGeometry::default(),
            ContentKind::Continuous,
        );
        let moving = Volume::new(
            "/d/moving.nii.gz",
            VolumeGeometry::default(),
            ContentKind::Continuous,
        );
        let stage = StageSpec::diffeomorphic();
        let job = RegistrationJob {
            fixed: &fixed,
            moving: &moving,
            output_prefix: Path::new("/out/p_"),
            stage: &stage,
            initial_transform: None,
            fixed_mask: None,
        };
        let err = FlirtLinear::new().run_stage(&job).unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
    }
}
