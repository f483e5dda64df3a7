pub mod orientation;
pub mod stage;
pub mod transform;
pub mod volume;

pub use orientation::{AxisDirection, FrameCode, FrameFamily, Handedness, OrientationCode};
pub use stage::{ConvergenceSchedule, SimilarityMetric, StageKind, StagePlan, StageSpec};
pub use transform::{MapDirection, TransformArtifact, TransformChain, TransformChainError, TransformStep};
pub use volume::{ContentKind, Interpolation, Volume, VolumeGeometry};
