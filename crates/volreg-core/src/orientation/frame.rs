//! Reference-frame codes.
//!
//! A reference-frame code states which coordinate convention a volume's
//! geometry annotation is expressed in. Volumes carry two such annotations
//! (the scanner-side and the aligned-side slot of the header); mismatch
//! severity between two volumes is judged on the code families, not the raw
//! numeric values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate convention annotation, mirroring the standard header codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameCode {
    /// No convention recorded.
    Unknown,
    /// Subject-native scanner anatomy.
    ScannerAnatomy,
    /// Subject-native, aligned to another subject-space scan.
    AlignedAnatomy,
    /// Talairach standard space.
    Talairach,
    /// MNI template standard space.
    MniTemplate,
}

/// Broad family of a frame code, used for mismatch-severity decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFamily {
    SubjectNative,
    StandardTemplate,
    Unspecified,
}

impl FrameCode {
    /// Decode the numeric header value. Out-of-range values collapse to
    /// `Unknown` rather than erroring; headers in the wild carry garbage.
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::ScannerAnatomy,
            2 => Self::AlignedAnatomy,
            3 => Self::Talairach,
            4 => Self::MniTemplate,
            _ => Self::Unknown,
        }
    }

    /// The numeric header value for this code.
    pub fn code(&self) -> i16 {
        match self {
            Self::Unknown => 0,
            Self::ScannerAnatomy => 1,
            Self::AlignedAnatomy => 2,
            Self::Talairach => 3,
            Self::MniTemplate => 4,
        }
    }

    /// Family this code belongs to.
    pub fn family(&self) -> FrameFamily {
        match self {
            Self::ScannerAnatomy | Self::AlignedAnatomy => FrameFamily::SubjectNative,
            Self::Talairach | Self::MniTemplate => FrameFamily::StandardTemplate,
            Self::Unknown => FrameFamily::Unspecified,
        }
    }
}

impl fmt::Display for FrameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::ScannerAnatomy => "scanner-anatomy",
            Self::AlignedAnatomy => "aligned-anatomy",
            Self::Talairach => "talairach",
            Self::MniTemplate => "mni-template",
        };
        write!(f, "{}", name)
    }
}
