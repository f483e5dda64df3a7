//! Registration orchestration for volumetric image pipelines.
//!
//! Drives an external registration engine through staged rigid, affine and
//! nonlinear alignment, with coordinate-metadata reconciliation up front,
//! tiered initialization, output verification and repair, an emergency
//! fallback cascade, transform application for atlas mapping, and quality
//! grading of the result.

pub mod apply;
pub mod cascade;
pub mod config;
pub mod driver;
pub mod error;
pub mod init;
pub mod outcome;
pub mod pipeline;
pub mod quality;
pub mod reconcile;
pub mod report;
pub mod verify;

pub use apply::{Applied, AtlasRegion, LabelAtlas, TransformApplication};
pub use cascade::{standard_methods, EmergencyCascade, FallbackContext, FallbackMethod, PlanFallback};
pub use config::{PipelineConfig, QualityThresholds};
pub use driver::{RegistrationRequest, StagedDriver};
pub use error::{PipelineError, Result};
pub use init::{InitializationPlan, InitializationSelector, InitializationStrategy};
pub use outcome::{AttemptRecord, DiagnosticTrail, RegistrationOutcome, RegistrationStatus};
pub use pipeline::{PipelineRun, RegistrationPipeline, RunOptions, Toolbox};
pub use quality::{QualityAssessor, QualityGrade, QualityMetrics, QualityReport};
pub use reconcile::{CoordinateReconciler, MismatchSeverity, OrientOp, OrientationCorrection};
pub use verify::OutputVerifier;
