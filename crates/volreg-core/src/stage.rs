//! Stage plans for staged registration.
//!
//! A stage plan is the ordered list of engine stages a registration request
//! runs through: rigid, then affine, then an optional regularized nonlinear
//! refinement. Each stage carries its similarity metric and a coarse-to-fine
//! convergence schedule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transform model optimized by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    /// 6-DOF rotation + translation.
    Rigid,
    /// 12-DOF rotation, scale, shear, translation.
    Affine,
    /// Symmetric diffeomorphic deformation.
    Diffeomorphic,
}

impl StageKind {
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Self::Diffeomorphic)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rigid => "rigid",
            Self::Affine => "affine",
            Self::Diffeomorphic => "diffeomorphic",
        };
        write!(f, "{}", name)
    }
}

/// Similarity metric driving a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    MutualInformation,
    CrossCorrelation,
}

/// Coarse-to-fine multi-resolution schedule for one stage.
///
/// The three vectors must have equal length: one entry per resolution level,
/// coarsest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSchedule {
    /// Iteration budget per level.
    pub iterations: Vec<usize>,
    /// Grid shrink factor per level.
    pub shrink_factors: Vec<usize>,
    /// Gaussian smoothing sigma per level, in voxels.
    pub smoothing_sigmas: Vec<f64>,
    /// Convergence threshold on the metric.
    pub threshold: f64,
}

impl ConvergenceSchedule {
    pub fn new(iterations: Vec<usize>, shrink_factors: Vec<usize>, smoothing_sigmas: Vec<f64>) -> Self {
        Self {
            iterations,
            shrink_factors,
            smoothing_sigmas,
            threshold: 1e-6,
        }
    }

    /// Default schedule for the linear stages.
    pub fn linear_default() -> Self {
        Self::new(vec![2100, 1200, 1200, 10], vec![8, 4, 2, 1], vec![3.0, 2.0, 1.0, 0.0])
    }

    /// Default schedule for the nonlinear stage.
    pub fn nonlinear_default() -> Self {
        Self::new(vec![100, 70, 50, 20], vec![8, 4, 2, 1], vec![3.0, 2.0, 1.0, 0.0])
    }

    /// Reduced-budget schedule for fast or emergency runs.
    pub fn reduced() -> Self {
        Self::new(vec![50, 30, 15], vec![4, 2, 1], vec![2.0, 1.0, 0.0])
    }

    pub fn levels(&self) -> usize {
        self.iterations.len()
    }

    /// Check the per-level vectors agree in length.
    pub fn validate(&self) -> Result<(), String> {
        if self.iterations.is_empty() {
            return Err("schedule needs at least one resolution level".to_string());
        }
        if self.shrink_factors.len() != self.levels() || self.smoothing_sigmas.len() != self.levels() {
            return Err(format!(
                "schedule level mismatch: {} iterations, {} shrink factors, {} sigmas",
                self.levels(),
                self.shrink_factors.len(),
                self.smoothing_sigmas.len()
            ));
        }
        Ok(())
    }
}

/// Full description of one registration stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub kind: StageKind,
    pub metric: SimilarityMetric,
    pub schedule: ConvergenceSchedule,
    /// Per-axis deformation restriction for nonlinear stages: `false`
    /// freezes deformation along that voxel axis. Used to keep the warp
    /// from crossing a known structural boundary.
    pub restrict_deformation: Option<[bool; 3]>,
}

impl StageSpec {
    pub fn rigid() -> Self {
        Self {
            kind: StageKind::Rigid,
            metric: SimilarityMetric::MutualInformation,
            schedule: ConvergenceSchedule::linear_default(),
            restrict_deformation: None,
        }
    }

    pub fn affine() -> Self {
        Self {
            kind: StageKind::Affine,
            metric: SimilarityMetric::MutualInformation,
            schedule: ConvergenceSchedule::linear_default(),
            restrict_deformation: None,
        }
    }

    pub fn diffeomorphic() -> Self {
        Self {
            kind: StageKind::Diffeomorphic,
            metric: SimilarityMetric::CrossCorrelation,
            schedule: ConvergenceSchedule::nonlinear_default(),
            restrict_deformation: None,
        }
    }

    pub fn with_schedule(mut self, schedule: ConvergenceSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_restriction(mut self, restrict: [bool; 3]) -> Self {
        self.restrict_deformation = Some(restrict);
        self
    }
}

/// Ordered list of stages a request runs through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePlan(Vec<StageSpec>);

impl StagePlan {
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self(stages)
    }

    /// The standard full plan: rigid, affine, diffeomorphic.
    pub fn full(restrict_deformation: Option<[bool; 3]>) -> Self {
        let mut nonlinear = StageSpec::diffeomorphic();
        nonlinear.restrict_deformation = restrict_deformation;
        Self(vec![StageSpec::rigid(), StageSpec::affine(), nonlinear])
    }

    /// Linear plan: rigid and affine, no deformation.
    pub fn affine_only() -> Self {
        Self(vec![StageSpec::rigid(), StageSpec::affine()])
    }

    /// Rigid alignment alone, on a reduced schedule. Used for fast guided
    /// sub-registrations.
    pub fn rigid_fast() -> Self {
        Self(vec![StageSpec::rigid().with_schedule(ConvergenceSchedule::reduced())])
    }

    /// Full plan with the nonlinear stage on a reduced iteration budget.
    pub fn aggressive_nonlinear() -> Self {
        let nonlinear = StageSpec::diffeomorphic().with_schedule(ConvergenceSchedule::reduced());
        Self(vec![StageSpec::rigid(), StageSpec::affine(), nonlinear])
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the final stage is nonlinear, i.e. the produced artifact is
    /// expected to carry warp fields.
    pub fn ends_nonlinear(&self) -> bool {
        self.0.last().map(|s| s.kind.is_nonlinear()).unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("stage plan is empty".to_string());
        }
        for (i, stage) in self.0.iter().enumerate() {
            stage
                .schedule
                .validate()
                .map_err(|e| format!("stage {} ({}): {}", i, stage.kind, e))?;
            if stage.restrict_deformation.is_some() && !stage.kind.is_nonlinear() {
                return Err(format!(
                    "stage {} ({}): deformation restriction only applies to nonlinear stages",
                    i, stage.kind
                ));
            }
        }
        Ok(())
    }
}
