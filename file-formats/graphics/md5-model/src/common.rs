//! Math and file helpers shared by the skeleton, mesh and animation code

use std::fs;
use std::path::Path;

use glam::{Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::error::{Md5Error, Result};
use crate::tokenizer::TokenReader;

/// Version number every supported MD5 file must declare
pub const MD5_VERSION: i32 = 10;

/// Upper bound on entries reserved up front from a count read from a file
const MAX_PREALLOCATION: usize = 4096;

/// Capacity to reserve for `declared` entries. Vectors grow past it when a
/// file really holds more.
pub(crate) fn initial_capacity(declared: usize) -> usize {
    declared.min(MAX_PREALLOCATION)
}

/// Read a whole MD5 text file
pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Md5Error::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `MD5Version <n>` and reject anything but [`MD5_VERSION`]
pub(crate) fn check_version<'a, R: TokenReader<'a>>(reader: &mut R) -> Result<()> {
    let found: i32 = reader.parse_value("version number")?;
    if found != MD5_VERSION {
        return Err(Md5Error::UnsupportedVersion {
            context: reader.context().to_string(),
            found,
            expected: MD5_VERSION,
        });
    }
    Ok(())
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Inverted box that any point or box will replace on first extension
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from its corners
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.extend(point);
        }
        bounds
    }

    /// Grow the box to contain `point`
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether no point has been added yet
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size along each axis
    pub fn extent(&self) -> Vec3 {
        self.max - self.center()
    }

    /// Corner-wise linear interpolation
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            min: lerp_vec3(self.min, other.min, t),
            max: lerp_vec3(self.max, other.max, t),
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Rebuild a unit quaternion from its stored x, y and z components.
///
/// MD5 files omit `w`; it is recovered as the negative root so that all
/// orientations in a file share one hemisphere.
pub fn quat_from_xyz(x: f32, y: f32, z: f32) -> Quat {
    let t = 1.0 - x * x - y * y - z * z;
    let w = if t < 0.0 { 0.0 } else { -t.sqrt() };
    Quat::from_xyzw(x, y, z, w)
}

/// `a + (b - a) * t`, exact at `a == b`
pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// Whether two quaternions describe the same rotation within `epsilon`
pub fn same_rotation(a: Quat, b: Quat, epsilon: f32) -> bool {
    a.abs_diff_eq(b, epsilon) || a.abs_diff_eq(-b, epsilon)
}
