//! Vertex skinning kernels for MD5 meshes
//!
//! MD5 weights store an offset in the joint's local space instead of a bind
//! matrix. A vertex is rebuilt by rotating each offset with the joint's
//! current orientation, translating by the joint's position, scaling by the
//! bias and summing:
//!
//! ```text
//! position = Σ bias_i * (joint_i.position + joint_i.orientation * offset_i)
//! normal   = Σ bias_i * (joint_i.orientation * weight_normal_i)
//! ```
//!
//! The same recombination applies to normals and tangents once they have been
//! stored in joint-local space (see [`Mesh::compute_weight_normals`]).
//!
//! [`Mesh::compute_weight_normals`]: crate::mesh::Mesh::compute_weight_normals

use glam::Vec3;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::mesh::Weight;
use crate::skeleton::Joint;

/// Options for controlling mesh loading and skinning
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SkinningOptions {
    /// Derive per-weight tangents at load time
    pub compute_tangents: bool,
    /// Rescale each vertex's biases so they sum to 1.0.
    /// When false, bad sums are only reported.
    pub normalize_weights: bool,
    /// Allowed deviation of a vertex's bias sum from 1.0
    pub weight_sum_tolerance: f32,
}

impl Default for SkinningOptions {
    fn default() -> Self {
        Self {
            compute_tangents: true,
            normalize_weights: false,
            weight_sum_tolerance: 1e-3,
        }
    }
}

/// A vertex rebuilt from its weights for one pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
}

/// Blend only the position of a vertex.
///
/// Callers guarantee that every weight's joint index is valid for `joints`.
pub(crate) fn skin_position(weights: &[Weight], joints: &[Joint]) -> Vec3 {
    weights.iter().fold(Vec3::ZERO, |acc, weight| {
        let joint = &joints[weight.joint];
        acc + joint.transform_point(weight.position) * weight.bias
    })
}

/// Blend position, normal and tangent of a vertex
pub(crate) fn skin_vertex(weights: &[Weight], joints: &[Joint]) -> SkinnedVertex {
    let mut out = SkinnedVertex::default();
    for weight in weights {
        let joint = &joints[weight.joint];
        out.position += joint.transform_point(weight.position) * weight.bias;
        out.normal += (joint.orientation * weight.normal) * weight.bias;
        out.tangent += (joint.orientation * weight.tangent) * weight.bias;
    }
    out
}

/// Sum of the biases of one vertex's weights
pub fn bias_sum(weights: &[Weight]) -> f32 {
    weights.iter().map(|weight| weight.bias).sum()
}
