//! Volume references and their physical-space metadata.

mod geometry;
#[allow(clippy::module_inception)]
mod volume;

pub use geometry::VolumeGeometry;
pub use volume::{ContentKind, Interpolation, Volume};
