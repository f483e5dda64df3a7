//! External-collaborator ports and adapters.
//!
//! The orchestration core treats the numerical registration engine, the
//! resampler, and the volume utilities as black boxes behind traits. This
//! crate defines those ports and ships the production adapters: ANTs and
//! FLIRT process invocation, and a NIfTI-backed implementation of the
//! volume-utility ports.

pub mod ants;
pub mod error;
pub mod flirt;
pub mod native;
mod process;
pub mod traits;

pub use ants::{AntsApplyTransforms, AntsRegistration, AtroposClassifier};
pub use error::EngineError;
pub use flirt::FlirtLinear;
pub use native::NiftiVolumes;
pub use traits::{
    ImageStats, IntensityStats, MaskOps, OverlapStats, RegistrationBackend, RegistrationJob,
    Resampler, TissueClassifier, VolumeOps, WarpStats,
};
