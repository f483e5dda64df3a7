//! Command-line front end for the registration pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use volreg_engine::{
    AntsApplyTransforms, AntsRegistration, AtroposClassifier, FlirtLinear, NiftiVolumes,
    TissueClassifier, VolumeOps,
};
use volreg_pipeline::{
    LabelAtlas, PipelineConfig, RegistrationPipeline, RunOptions, Toolbox,
};

/// Register a moving volume onto a fixed reference and grade the result.
#[derive(Parser, Debug)]
#[command(name = "volreg", version, about)]
struct Args {
    /// Fixed (reference) volume.
    fixed: PathBuf,

    /// Moving volume to align.
    moving: PathBuf,

    /// Output prefix all artifacts are written under.
    output_prefix: PathBuf,

    /// Modality label recorded in logs (e.g. T1, FLAIR, DWI).
    #[arg(long)]
    modality: Option<String>,

    /// Configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reuse an existing transform as initialization.
    #[arg(long)]
    initial_transform: Option<PathBuf>,

    /// Structural mask for cost-masked initialization.
    #[arg(long)]
    cost_mask: Option<PathBuf>,

    /// Existing segmentation for guided initialization.
    #[arg(long)]
    segmentation: Option<PathBuf>,

    /// Enable guided (tissue-boundary mask) initialization.
    #[arg(long)]
    guided: bool,

    /// Label atlas to map into subject space after registration.
    #[arg(long, requires = "atlas_labels")]
    atlas: Option<PathBuf>,

    /// Region lookup table for the atlas (lines of `index name`).
    #[arg(long, requires = "atlas")]
    atlas_labels: Option<PathBuf>,
}

fn run(args: Args) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if args.guided {
        config = config.with_guided_initialization(true);
    }

    let registration = AntsRegistration::new();
    let linear_fallback = FlirtLinear::new();
    let resampler = AntsApplyTransforms::new();
    let volumes = NiftiVolumes::new();
    let classifier = AtroposClassifier::new();
    let toolbox = Toolbox {
        registration: &registration,
        linear_fallback: &linear_fallback,
        resampler: &resampler,
        volumes: &volumes,
        masks: &volumes,
        stats: &volumes,
        classifier: Some(&classifier as &dyn TissueClassifier),
    };
    let pipeline = RegistrationPipeline::new(config, toolbox)?;

    if let Some(modality) = &args.modality {
        info!(modality = %modality, "starting registration");
    }
    let options = RunOptions {
        initial_transform: args.initial_transform.clone(),
        structural_mask: args.cost_mask.clone(),
        segmentation: args.segmentation.clone(),
    };
    let run = pipeline.run(&args.fixed, &args.moving, &args.output_prefix, &options)?;
    info!(
        status = %run.outcome.status,
        grade = %run.quality.grade,
        warped = %run.outcome.warped.path().display(),
        "registration finished"
    );

    let failed = run.outcome.status.is_failure();
    if failed {
        error!(
            trail = %run.outcome.trail,
            "registration failed; placeholder written"
        );
        return Ok(false);
    }

    if let (Some(atlas_path), Some(labels_path)) = (&args.atlas, &args.atlas_labels) {
        let atlas_volume = volumes
            .probe(atlas_path, volreg_core::ContentKind::Label)
            .with_context(|| format!("reading atlas {}", atlas_path.display()))?;
        let atlas = LabelAtlas::from_lookup_file(atlas_volume, labels_path)?;
        let region_dir = args
            .output_prefix
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("regions");
        let regions = pipeline.map_atlas(&atlas, &run, &region_dir)?;
        info!(count = regions.len(), dir = %region_dir.display(), "atlas regions mapped");
    }

    Ok(true)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "registration aborted");
            ExitCode::FAILURE
        }
    }
}
