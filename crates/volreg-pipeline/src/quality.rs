//! Quality assessment of a registered result.

use crate::config::QualityThresholds;
use std::fmt;
use std::path::Path;
use tracing::warn;
use volreg_core::Volume;
use volreg_engine::{ImageStats, OverlapStats, WarpStats};

/// Ordinal quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
    /// No metric could be computed at all.
    Unknown,
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Numeric agreement metrics between a registered result and its
/// reference. Absent values mean the metric could not be computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityMetrics {
    pub correlation: Option<f64>,
    pub mutual_information: Option<f64>,
    pub normalized_cross_correlation: Option<f64>,
    pub overlap: Option<OverlapStats>,
    pub warp: Option<WarpStats>,
}

/// One quality report per registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub metrics: QualityMetrics,
    pub grade: QualityGrade,
    /// The correlation value was substituted, not measured.
    pub assumed_default: bool,
}

/// Computes agreement metrics and maps them onto a grade.
pub struct QualityAssessor<'a> {
    stats: &'a dyn ImageStats,
    thresholds: QualityThresholds,
    assume_acceptable_when_unmeasured: bool,
}

impl<'a> QualityAssessor<'a> {
    pub fn new(
        stats: &'a dyn ImageStats,
        thresholds: QualityThresholds,
        assume_acceptable_when_unmeasured: bool,
    ) -> Self {
        Self {
            stats,
            thresholds,
            assume_acceptable_when_unmeasured,
        }
    }

    /// Assess `candidate` against `reference`.
    ///
    /// Overlap metrics are included when a pair of binary masks is
    /// available; warp statistics when the transform carried a forward
    /// warp. Never fails: anything uncomputable degrades to an absent
    /// metric, and a fully unmeasurable report grades `Unknown`.
    pub fn assess(
        &self,
        reference: &Volume,
        candidate: &Volume,
        masks: Option<(&Volume, &Volume)>,
        warp: Option<&Path>,
    ) -> QualityReport {
        let mut metrics = QualityMetrics::default();

        metrics.correlation = self
            .stats
            .correlation(reference, candidate)
            .map_err(|e| warn!(error = %e, "correlation unavailable"))
            .ok();
        metrics.mutual_information = self
            .stats
            .mutual_information(reference, candidate)
            .map_err(|e| warn!(error = %e, "mutual information unavailable"))
            .ok();
        metrics.normalized_cross_correlation = self
            .stats
            .normalized_cross_correlation(reference, candidate)
            .map_err(|e| warn!(error = %e, "normalized cross-correlation unavailable"))
            .ok();
        if let Some((a, b)) = masks {
            metrics.overlap = self
                .stats
                .overlap(a, b)
                .map_err(|e| warn!(error = %e, "overlap unavailable"))
                .ok();
        }
        if let Some(warp_path) = warp {
            metrics.warp = self
                .stats
                .warp_statistics(warp_path)
                .map_err(|e| warn!(error = %e, "warp statistics unavailable"))
                .ok();
        }

        let mut assumed_default = false;
        let grade = match (metrics.overlap, metrics.correlation) {
            (None, None) => {
                if self.assume_acceptable_when_unmeasured {
                    // Substituted so downstream aggregation has a number to
                    // chew on; recorded as an assumption, not a measurement.
                    warn!(
                        substituted = self.thresholds.acceptable_correlation,
                        "no quality metric computable; assuming acceptable-tier correlation"
                    );
                    metrics.correlation = Some(self.thresholds.acceptable_correlation);
                    assumed_default = true;
                }
                QualityGrade::Unknown
            }
            (overlap, correlation) => self.grade(overlap.map(|o| o.dice), correlation),
        };

        QualityReport {
            metrics,
            grade,
            assumed_default,
        }
    }

    fn grade(&self, overlap: Option<f64>, correlation: Option<f64>) -> QualityGrade {
        let t = &self.thresholds;
        let beats = |ovl_cut: f64, corr_cut: f64| {
            overlap.map(|o| o > ovl_cut).unwrap_or(false)
                || correlation.map(|c| c > corr_cut).unwrap_or(false)
        };
        if beats(t.excellent_overlap, t.excellent_correlation) {
            QualityGrade::Excellent
        } else if beats(t.good_overlap, t.good_correlation) {
            QualityGrade::Good
        } else if beats(t.acceptable_overlap, t.acceptable_correlation) {
            QualityGrade::Acceptable
        } else {
            QualityGrade::Poor
        }
    }
}
