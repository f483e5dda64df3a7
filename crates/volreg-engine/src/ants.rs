//! ANTs tool adapters.
//!
//! `antsRegistration` is the primary registration backend,
//! `antsApplyTransforms` the resampler, and `Atropos` the optional tissue
//! classifier. Each adapter only builds a command line and interprets the
//! exit status; argument construction is kept in pure functions so it can
//! be tested without the binaries installed.

use crate::error::{EngineError, Result};
use crate::process::run_tool;
use crate::traits::{RegistrationBackend, RegistrationJob, Resampler, TissueClassifier, VolumeOps};
use crate::NiftiVolumes;
use std::path::Path;
use std::process::Command;
use volreg_core::transform::{artifact_path, WARPED_SUFFIX};
use volreg_core::{ContentKind, Interpolation, SimilarityMetric, StageKind, TransformChain, Volume};

/// `antsRegistration` invocation.
#[derive(Debug, Clone)]
pub struct AntsRegistration {
    executable: String,
    threads: Option<usize>,
}

impl Default for AntsRegistration {
    fn default() -> Self {
        Self {
            executable: "antsRegistration".to_string(),
            threads: None,
        }
    }
}

impl AntsRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific binary (e.g. from a pinned ANTs install).
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Cap the tool's thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

fn join_x<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("x")
}

/// Build the full `antsRegistration` argument list for one stage.
pub fn registration_args(job: &RegistrationJob<'_>) -> Result<Vec<String>> {
    let stage = job.stage;
    let fixed = job.fixed.path().display().to_string();
    let moving = job.moving.path().display().to_string();
    let prefix = job.output_prefix.display().to_string();
    let warped = artifact_path(job.output_prefix, WARPED_SUFFIX)
        .display()
        .to_string();

    let transform = match stage.kind {
        StageKind::Rigid => "Rigid[0.1]".to_string(),
        StageKind::Affine => "Affine[0.1]".to_string(),
        StageKind::Diffeomorphic => "SyN[0.1,3,0]".to_string(),
    };
    let metric = match stage.metric {
        SimilarityMetric::MutualInformation => {
            format!("MI[{},{},1,32,Regular,0.25]", fixed, moving)
        }
        SimilarityMetric::CrossCorrelation => format!("CC[{},{},1,4]", fixed, moving),
    };
    let convergence = format!(
        "[{},{},10]",
        join_x(&stage.schedule.iterations),
        stage.schedule.threshold
    );

    let mut args = vec![
        "--dimensionality".to_string(),
        "3".to_string(),
        "--float".to_string(),
        "0".to_string(),
        "--output".to_string(),
        format!("[{},{}]", prefix, warped),
        "--interpolation".to_string(),
        "Linear".to_string(),
        "--winsorize-image-intensities".to_string(),
        "[0.005,0.995]".to_string(),
        "--use-histogram-matching".to_string(),
        "0".to_string(),
        "--initial-moving-transform".to_string(),
    ];
    match job.initial_transform {
        Some(path) => args.push(path.display().to_string()),
        None => args.push(format!("[{},{},1]", fixed, moving)),
    }
    args.extend([
        "--transform".to_string(),
        transform,
        "--metric".to_string(),
        metric,
        "--convergence".to_string(),
        convergence,
        "--shrink-factors".to_string(),
        join_x(&stage.schedule.shrink_factors),
        "--smoothing-sigmas".to_string(),
        format!("{}vox", join_x(&stage.schedule.smoothing_sigmas)),
    ]);
    if let Some(restrict) = stage.restrict_deformation {
        if !stage.kind.is_nonlinear() {
            return Err(EngineError::unsupported(
                "deformation restriction on a linear stage",
            ));
        }
        let weights: Vec<u8> = restrict.iter().map(|&on| u8::from(on)).collect();
        args.push("--restrict-deformation".to_string());
        args.push(join_x(&weights));
    }
    if let Some(mask) = job.fixed_mask {
        args.push("--masks".to_string());
        args.push(format!("[{},NULL]", mask.path().display()));
    }
    Ok(args)
}

impl RegistrationBackend for AntsRegistration {
    fn name(&self) -> &str {
        "antsRegistration"
    }

    fn run_stage(&self, job: &RegistrationJob<'_>) -> Result<()> {
        let args = registration_args(job)?;
        let mut command = Command::new(&self.executable);
        command.args(&args);
        if let Some(threads) = self.threads {
            command.env("ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS", threads.to_string());
        }
        run_tool(command, &self.executable)
    }
}

/// `antsApplyTransforms` invocation.
#[derive(Debug, Clone)]
pub struct AntsApplyTransforms {
    executable: String,
    volumes: NiftiVolumes,
}

impl Default for AntsApplyTransforms {
    fn default() -> Self {
        Self {
            executable: "antsApplyTransforms".to_string(),
            volumes: NiftiVolumes::new(),
        }
    }
}

impl AntsApplyTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }
}

/// Build the `antsApplyTransforms` argument list.
///
/// The tool applies the last-listed transform first, so the resolved chain
/// (which is in application order) is emitted in reverse.
pub fn apply_args(
    source: &Volume,
    reference: &Volume,
    chain: &TransformChain,
    interpolation: Interpolation,
    output: &Path,
) -> Vec<String> {
    let interp = match interpolation {
        Interpolation::Linear => "Linear",
        Interpolation::NearestNeighbor => "NearestNeighbor",
    };
    let mut args = vec![
        "-d".to_string(),
        "3".to_string(),
        "-i".to_string(),
        source.path().display().to_string(),
        "-r".to_string(),
        reference.path().display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "-n".to_string(),
        interp.to_string(),
    ];
    for step in chain.steps.iter().rev() {
        args.push("-t".to_string());
        if step.invert {
            args.push(format!("[{},1]", step.path.display()));
        } else {
            args.push(step.path.display().to_string());
        }
    }
    args
}

impl Resampler for AntsApplyTransforms {
    fn resample(
        &self,
        source: &Volume,
        reference: &Volume,
        chain: &TransformChain,
        interpolation: Interpolation,
        output: &Path,
    ) -> Result<Volume> {
        let args = apply_args(source, reference, chain, interpolation, output);
        let mut command = Command::new(&self.executable);
        command.args(&args);
        run_tool(command, &self.executable)?;
        if !output.is_file() {
            return Err(EngineError::output_missing(output));
        }
        self.volumes.probe(output, source.kind())
    }
}

/// `Atropos` tissue-classification invocation.
#[derive(Debug, Clone)]
pub struct AtroposClassifier {
    executable: String,
    volumes: NiftiVolumes,
}

impl Default for AtroposClassifier {
    fn default() -> Self {
        Self {
            executable: "Atropos".to_string(),
            volumes: NiftiVolumes::new(),
        }
    }
}

impl AtroposClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }
}

impl TissueClassifier for AtroposClassifier {
    fn classify(&self, volume: &Volume, classes: usize, output_prefix: &Path) -> Result<Volume> {
        let segmentation = artifact_path(output_prefix, "Segmentation.nii.gz");
        let mut command = Command::new(&self.executable);
        command.args([
            "-d",
            "3",
            "-a",
            &volume.path().display().to_string(),
            "-i",
            &format!("KMeans[{}]", classes),
            "-c",
            "[5,0]",
            "-m",
            "[0.2,1x1x1]",
            "-o",
            &segmentation.display().to_string(),
        ]);
        run_tool(command, &self.executable)?;
        if !segmentation.is_file() {
            return Err(EngineError::output_missing(segmentation));
        }
        self.volumes.probe(&segmentation, ContentKind::Label)
    }
}
