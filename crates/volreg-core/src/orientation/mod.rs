//! Orientation and reference-frame metadata.
//!
//! This module provides the anatomical orientation code attached to a
//! volume's voxel axes and the reference-frame annotations that state which
//! coordinate convention the volume's geometry is expressed in.

mod code;
mod frame;

pub use code::{AxisDirection, AxisRemap, Handedness, OrientationCode};
pub use frame::{FrameCode, FrameFamily};
