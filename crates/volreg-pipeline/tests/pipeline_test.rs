mod common;

use common::{place_volume, JsonVolumes, MockBackend, MockResampler, StageBehavior, TestVolume};
use std::fs;
use tempfile::tempdir;
use volreg_core::transform::artifact_path;
use volreg_core::ContentKind;
use volreg_pipeline::{
    PipelineConfig, QualityGrade, RegistrationPipeline, RegistrationStatus, RunOptions, Toolbox,
};

fn toolbox<'a>(
    primary: &'a MockBackend,
    linear: &'a MockBackend,
    resampler: &'a MockResampler,
    ops: &'a JsonVolumes,
) -> Toolbox<'a> {
    Toolbox {
        registration: primary,
        linear_fallback: linear,
        resampler,
        volumes: ops,
        masks: ops,
        stats: ops,
        classifier: None,
    }
}

#[test]
fn test_identical_volumes_register_with_high_grade() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([8, 8, 8]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);
    place_volume(&dir.path().join("moving.json"), &tv, ContentKind::Continuous);

    let primary = MockBackend::always("mock", StageBehavior::Succeed);
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let prefix = dir.path().join("out").join("sub01_");
    let run = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &prefix,
            &RunOptions::default(),
        )
        .unwrap();

    assert_eq!(run.outcome.status, RegistrationStatus::Succeeded);
    assert!(run.outcome.require_success().is_ok());
    // zero true misalignment must grade at the top tiers
    assert!(
        matches!(run.quality.grade, QualityGrade::Excellent | QualityGrade::Good),
        "grade {:?}",
        run.quality.grade
    );
    assert!(run.quality.metrics.correlation.unwrap() > 0.9);
}

#[test]
fn test_reports_are_written_next_to_artifacts() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);
    place_volume(&dir.path().join("moving.json"), &tv, ContentKind::Continuous);

    let primary = MockBackend::always("mock", StageBehavior::Succeed);
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let prefix = dir.path().join("out_");
    pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &prefix,
            &RunOptions::default(),
        )
        .unwrap();

    let csv = fs::read_to_string(artifact_path(&prefix, "quality.csv")).unwrap();
    assert!(csv.lines().count() >= 2);
    assert!(csv.contains("reference_id,moving_id"));
    let json = fs::read_to_string(artifact_path(&prefix, "outcome.json")).unwrap();
    assert!(json.contains("\"status\": \"succeeded\""));
    assert!(artifact_path(&prefix, "trail.txt").is_file());
}

#[test]
fn test_rigid_failure_recovers_via_affine_only() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);
    place_volume(&dir.path().join("moving.json"), &tv, ContentKind::Continuous);

    // the engine fails every stage except those run for the affine-only
    // fallback method (keyed by its isolated workspace)
    let primary = MockBackend::new("mock", |job| {
        if job.output_prefix.display().to_string().contains("affine-only") {
            StageBehavior::Succeed
        } else {
            StageBehavior::Fail
        }
    });
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let prefix = dir.path().join("out_");
    let run = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &prefix,
            &RunOptions::default(),
        )
        .unwrap();

    assert_eq!(
        run.outcome.status,
        RegistrationStatus::RecoveredViaFallback("affine-only".to_string())
    );
    // the normal-path failure is on the trail
    assert!(run
        .outcome
        .trail
        .records()
        .iter()
        .any(|r| r.method == "staged-driver"));
}

#[test]
fn test_silent_engine_ends_failed_with_placeholder() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);
    place_volume(&dir.path().join("moving.json"), &tv, ContentKind::Continuous);

    let primary = MockBackend::always("mock", StageBehavior::SucceedNoArtifacts);
    let linear = MockBackend::always("mock-linear", StageBehavior::SucceedNoArtifacts);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let prefix = dir.path().join("out_");
    let run = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &prefix,
            &RunOptions::default(),
        )
        .unwrap();

    assert_eq!(run.outcome.status, RegistrationStatus::Failed);
    assert!(run.outcome.require_success().is_err());
    // placeholder exists and is all zeros
    let placeholder = TestVolume::read(run.outcome.warped.path()).unwrap();
    assert!(placeholder.data.iter().all(|&v| v == 0.0));
    // the trail enumerates the driver failure plus all four fallbacks
    assert_eq!(run.outcome.trail.len(), 5);
    let trail_file = fs::read_to_string(artifact_path(&prefix, "trail.txt")).unwrap();
    assert!(trail_file.contains("aggressive-nonlinear"));
    assert!(trail_file.contains("linear-only"));
}

#[test]
fn test_undersized_cost_mask_runs_unguided() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);
    place_volume(&dir.path().join("moving.json"), &tv, ContentKind::Continuous);
    let mut small = TestVolume::filled([6, 6, 6], 0.0);
    small.set(3, 3, 3, 1.0);
    place_volume(&dir.path().join("mask.json"), &small, ContentKind::Label);

    let primary = MockBackend::always("mock", StageBehavior::Succeed);
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let options = RunOptions {
        structural_mask: Some(dir.path().join("mask.json")),
        ..RunOptions::default()
    };
    let run = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &dir.path().join("out_"),
            &options,
        )
        .unwrap();

    assert_eq!(run.outcome.status, RegistrationStatus::Succeeded);
    // the undersized mask must not restrict the metric anywhere
    for job in primary.recorded_jobs() {
        assert!(job.fixed_mask.is_none(), "job {:?}", job);
    }
}

#[test]
fn test_cosmetic_orientation_mismatch_corrected_before_registration() {
    let dir = tempdir().unwrap();
    let fixed_tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &fixed_tv, ContentKind::Continuous);
    let mut moving_tv = TestVolume::ramp([6, 6, 6]);
    moving_tv.orientation = "LAS".to_string();
    place_volume(&dir.path().join("moving.json"), &moving_tv, ContentKind::Continuous);

    let primary = MockBackend::always("mock", StageBehavior::Succeed);
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let run = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("moving.json"),
            &dir.path().join("out_"),
            &RunOptions::default(),
        )
        .unwrap();

    assert!(run.correction.was_applied());
    assert_eq!(
        run.moving.geometry().orientation,
        run.fixed.geometry().orientation
    );
    assert_eq!(run.outcome.status, RegistrationStatus::Succeeded);
}

#[test]
fn test_missing_input_is_rejected_immediately() {
    let dir = tempdir().unwrap();
    let tv = TestVolume::ramp([6, 6, 6]);
    place_volume(&dir.path().join("fixed.json"), &tv, ContentKind::Continuous);

    let primary = MockBackend::always("mock", StageBehavior::Succeed);
    let linear = MockBackend::always("mock-linear", StageBehavior::Fail);
    let resampler = MockResampler::new();
    let ops = JsonVolumes;
    let pipeline =
        RegistrationPipeline::new(PipelineConfig::default(), toolbox(&primary, &linear, &resampler, &ops))
            .unwrap();

    let err = pipeline
        .run(
            &dir.path().join("fixed.json"),
            &dir.path().join("absent.json"),
            &dir.path().join("out_"),
            &RunOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, volreg_pipeline::PipelineError::InputInvalid(_)));
    // the engine was never invoked
    assert!(primary.recorded_jobs().is_empty());
}
