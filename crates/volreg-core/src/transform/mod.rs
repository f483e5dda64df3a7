//! Transform artifacts and chain resolution.
//!
//! A registration result is a named set of component files sharing an output
//! prefix. The artifact is populated once, by the component that observed
//! the files being written, and resolved into an ordered application chain
//! on demand.

mod artifact;
mod step;

pub use artifact::{artifact_path, TransformArtifact, TransformChainError};
pub use artifact::{AFFINE_SUFFIX, INVERSE_WARP_SUFFIX, WARPED_SUFFIX, WARP_SUFFIX};
pub use step::{MapDirection, TransformChain, TransformStep};
