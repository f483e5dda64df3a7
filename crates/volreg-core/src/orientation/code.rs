//! Anatomical orientation codes.
//!
//! An orientation code is the familiar three-letter label ("RAS", "LPI", ...)
//! stating, for each voxel axis in storage order, the anatomical direction
//! that axis runs toward. Codes are derived from a direction cosine matrix by
//! dominant-axis classification and never re-inferred once attached to a
//! volume.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six anatomical directions a voxel axis can run toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisDirection {
    Right,
    Left,
    Anterior,
    Posterior,
    Superior,
    Inferior,
}

impl AxisDirection {
    /// Single-letter form used in orientation strings.
    pub fn letter(&self) -> char {
        match self {
            Self::Right => 'R',
            Self::Left => 'L',
            Self::Anterior => 'A',
            Self::Posterior => 'P',
            Self::Superior => 'S',
            Self::Inferior => 'I',
        }
    }

    /// Parse a single orientation letter.
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'R' => Some(Self::Right),
            'L' => Some(Self::Left),
            'A' => Some(Self::Anterior),
            'P' => Some(Self::Posterior),
            'S' => Some(Self::Superior),
            'I' => Some(Self::Inferior),
            _ => None,
        }
    }

    /// The opposite direction along the same anatomical axis.
    pub fn flipped(&self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Anterior => Self::Posterior,
            Self::Posterior => Self::Anterior,
            Self::Superior => Self::Inferior,
            Self::Inferior => Self::Superior,
        }
    }

    /// Index of the anatomical axis this direction lies on:
    /// 0 = left/right, 1 = anterior/posterior, 2 = superior/inferior.
    pub fn anatomical_axis(&self) -> usize {
        match self {
            Self::Right | Self::Left => 0,
            Self::Anterior | Self::Posterior => 1,
            Self::Superior | Self::Inferior => 2,
        }
    }

    /// Whether the direction points toward the positive end of its axis
    /// (Right, Anterior, Superior).
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Right | Self::Anterior | Self::Superior)
    }
}

/// Left/right storage convention of a volume.
///
/// Neurological volumes store the left/right axis running toward the
/// subject's right; radiological volumes run it toward the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Neurological,
    Radiological,
}

/// Voxel-axis permutation mapping one orientation onto another.
///
/// `order[j]` is the source axis that becomes target axis `j`;
/// `flip[j]` states whether that axis must additionally be reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRemap {
    pub order: [usize; 3],
    pub flip: [bool; 3],
}

impl AxisRemap {
    /// A remap that leaves the volume untouched.
    pub fn identity() -> Self {
        Self {
            order: [0, 1, 2],
            flip: [false, false, false],
        }
    }

    /// True when the remap neither permutes nor flips any axis.
    pub fn is_identity(&self) -> bool {
        self == &Self::identity()
    }
}

/// Three-letter anatomical orientation of a volume's voxel axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrientationCode([AxisDirection; 3]);

impl OrientationCode {
    pub const RAS: Self = Self([
        AxisDirection::Right,
        AxisDirection::Anterior,
        AxisDirection::Superior,
    ]);
    pub const LAS: Self = Self([
        AxisDirection::Left,
        AxisDirection::Anterior,
        AxisDirection::Superior,
    ]);

    /// Create an orientation from explicit axis directions.
    ///
    /// Returns `None` when the three directions do not cover all three
    /// anatomical axes (e.g. "RRS").
    pub fn new(axes: [AxisDirection; 3]) -> Option<Self> {
        let mut seen = [false; 3];
        for a in &axes {
            let i = a.anatomical_axis();
            if seen[i] {
                return None;
            }
            seen[i] = true;
        }
        Some(Self(axes))
    }

    /// The axis directions in voxel storage order.
    pub fn axes(&self) -> &[AxisDirection; 3] {
        &self.0
    }

    /// Classify a direction cosine matrix into an orientation code.
    ///
    /// Column `i` of the matrix is the physical direction of voxel axis `i`;
    /// the dominant component of each column picks the anatomical label.
    /// Assumes the physical frame is the conventional one where +x is right,
    /// +y anterior, +z superior.
    pub fn from_direction(direction: &SMatrix<f64, 3, 3>) -> Self {
        let mut axes = [AxisDirection::Right; 3];
        for i in 0..3 {
            let mut dominant = 0;
            let mut magnitude = 0.0;
            for r in 0..3 {
                let v = direction[(r, i)].abs();
                if v > magnitude {
                    magnitude = v;
                    dominant = r;
                }
            }
            let positive = direction[(dominant, i)] >= 0.0;
            axes[i] = match (dominant, positive) {
                (0, true) => AxisDirection::Right,
                (0, false) => AxisDirection::Left,
                (1, true) => AxisDirection::Anterior,
                (1, false) => AxisDirection::Posterior,
                (2, true) => AxisDirection::Superior,
                (2, false) => AxisDirection::Inferior,
                _ => unreachable!(),
            };
        }
        // Degenerate matrices can classify two columns onto one axis; fall
        // back to RAS rather than carry an unusable code.
        Self::new(axes).unwrap_or(Self::RAS)
    }

    /// Voxel axis (storage order) that runs along the left/right axis.
    pub fn lr_axis(&self) -> usize {
        self.0
            .iter()
            .position(|a| a.anatomical_axis() == 0)
            .expect("orientation codes always cover the left/right axis")
    }

    /// Left/right convention of this orientation.
    pub fn handedness(&self) -> Handedness {
        if self.0[self.lr_axis()] == AxisDirection::Right {
            Handedness::Neurological
        } else {
            Handedness::Radiological
        }
    }

    /// The same orientation with the left/right axis reversed.
    pub fn with_flipped_handedness(&self) -> Self {
        let mut axes = self.0;
        let lr = self.lr_axis();
        axes[lr] = axes[lr].flipped();
        Self(axes)
    }

    /// True when the two codes assign the same anatomical axis to every
    /// voxel slot, ignoring direction along the left/right axis.
    pub fn same_axes(&self, other: &Self) -> bool {
        (0..3).all(|i| self.0[i].anatomical_axis() == other.0[i].anatomical_axis())
    }

    /// Compute the voxel-axis permutation that reorients a volume stored in
    /// this orientation into `target`.
    pub fn remap_to(&self, target: &Self) -> AxisRemap {
        let mut order = [0usize; 3];
        let mut flip = [false; 3];
        for (j, want) in target.0.iter().enumerate() {
            let i = self
                .0
                .iter()
                .position(|have| have.anatomical_axis() == want.anatomical_axis())
                .expect("both codes cover all anatomical axes");
            order[j] = i;
            flip[j] = self.0[i] != *want;
        }
        AxisRemap { order, flip }
    }
}

impl fmt::Display for OrientationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.0 {
            write!(f, "{}", a.letter())?;
        }
        Ok(())
    }
}

impl FromStr for OrientationCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letters: Vec<char> = s.chars().collect();
        if letters.len() != 3 {
            return Err(format!("orientation code must have 3 letters, got {:?}", s));
        }
        let mut axes = [AxisDirection::Right; 3];
        for (i, c) in letters.iter().enumerate() {
            axes[i] = AxisDirection::from_letter(*c)
                .ok_or_else(|| format!("invalid orientation letter {:?}", c))?;
        }
        OrientationCode::new(axes).ok_or_else(|| format!("degenerate orientation code {:?}", s))
    }
}

impl TryFrom<String> for OrientationCode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OrientationCode> for String {
    fn from(code: OrientationCode) -> Self {
        code.to_string()
    }
}
