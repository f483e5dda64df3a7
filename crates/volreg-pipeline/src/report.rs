//! Persisted run reports: quality CSV, JSON outcome summary, trail file.

use crate::error::Result;
use crate::outcome::{AttemptRecord, RegistrationOutcome, RegistrationStatus};
use crate::quality::QualityReport;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use volreg_core::Volume;

/// One row of the tabular quality report.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityCsvRow {
    pub reference_id: String,
    pub moving_id: String,
    pub overlap: Option<f64>,
    pub cross_correlation: Option<f64>,
    pub displacement: Option<f64>,
    pub deformation_variability: Option<f64>,
    pub grade: String,
}

impl QualityCsvRow {
    pub fn from_report(reference: &Volume, moving: &Volume, report: &QualityReport) -> Self {
        Self {
            reference_id: reference.id(),
            moving_id: moving.id(),
            overlap: report.metrics.overlap.map(|o| o.dice),
            cross_correlation: report.metrics.correlation,
            displacement: report.metrics.warp.map(|w| w.mean_displacement),
            deformation_variability: report.metrics.warp.map(|w| w.variability),
            grade: report.grade.to_string(),
        }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

/// Write the quality rows as CSV with a fixed header.
pub fn write_quality_csv(path: &Path, rows: &[QualityCsvRow]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(
        file,
        "reference_id,moving_id,overlap,cross_correlation,displacement,deformation_variability,grade"
    )?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            row.reference_id,
            row.moving_id,
            cell(row.overlap),
            cell(row.cross_correlation),
            cell(row.displacement),
            cell(row.deformation_variability),
            row.grade
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct OutcomeSummary<'a> {
    status: String,
    recovered_via: Option<&'a str>,
    warped: String,
    transform_prefix: String,
    grade: String,
    assumed_default_quality: bool,
    attempts: &'a [AttemptRecord],
}

/// Write the machine-readable outcome summary as JSON.
pub fn write_outcome_summary(
    path: &Path,
    outcome: &RegistrationOutcome,
    quality: &QualityReport,
) -> Result<()> {
    let recovered_via = match &outcome.status {
        RegistrationStatus::RecoveredViaFallback(method) => Some(method.as_str()),
        _ => None,
    };
    let summary = OutcomeSummary {
        status: outcome.status.to_string(),
        recovered_via,
        warped: outcome.warped.path().display().to_string(),
        transform_prefix: outcome.transform.prefix().display().to_string(),
        grade: quality.grade.to_string(),
        assumed_default_quality: quality.assumed_default,
        attempts: outcome.trail.records(),
    };
    let json = serde_json::to_string_pretty(&summary)
        .expect("outcome summary serialization cannot fail");
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::DiagnosticTrail;
    use crate::quality::{QualityGrade, QualityMetrics};
    use tempfile::tempdir;
    use volreg_core::{ContentKind, TransformArtifact, VolumeGeometry};
    use volreg_engine::OverlapStats;

    fn volume(path: &str) -> Volume {
        Volume::new(path, VolumeGeometry::default(), ContentKind::Continuous)
    }

    fn report() -> QualityReport {
        QualityReport {
            metrics: QualityMetrics {
                correlation: Some(0.91),
                mutual_information: None,
                normalized_cross_correlation: Some(0.95),
                overlap: Some(OverlapStats {
                    jaccard: 0.7,
                    dice: 0.82,
                }),
                warp: None,
            },
            grade: QualityGrade::Excellent,
            assumed_default: false,
        }
    }

    #[test]
    fn test_csv_row_and_file() {
        let dir = tempdir().unwrap();
        let reference = volume("/data/template.nii.gz");
        let moving = volume("/data/sub-01_T1w.nii.gz");
        let row = QualityCsvRow::from_report(&reference, &moving, &report());
        assert_eq!(row.reference_id, "template");
        assert_eq!(row.moving_id, "sub-01_T1w");
        assert_eq!(row.grade, "excellent");

        let path = dir.path().join("quality.csv");
        write_quality_csv(&path, &[row]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "reference_id,moving_id,overlap,cross_correlation,displacement,deformation_variability,grade"
        );
        let data = lines.next().unwrap();
        assert!(data.starts_with("template,sub-01_T1w,0.820000,0.910000,,,excellent"));
    }

    #[test]
    fn test_outcome_summary_json() {
        let dir = tempdir().unwrap();
        let mut trail = DiagnosticTrail::new();
        trail.record("antsRegistration:rigid", "engine exited 1");
        trail.record("affine-only", "succeeded");
        let outcome = RegistrationOutcome::recovered(
            "affine-only",
            volume("/out/p_Warped.nii.gz"),
            TransformArtifact::discover(Path::new("/out/p_"), false),
            trail,
        );
        let path = dir.path().join("outcome.json");
        write_outcome_summary(&path, &outcome, &report()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"recovered_via\": \"affine-only\""));
        assert!(text.contains("\"grade\": \"excellent\""));
        assert!(text.contains("engine exited 1"));
    }
}
