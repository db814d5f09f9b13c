//! Joint hierarchy and pose snapshots
//!
//! A [`Skeleton`] is one pose at one instant: the bind pose of a model, one
//! decoded animation frame, or the interpolated pose an object renders.
//! Joint transforms are stored in model space. Parents always precede their
//! children, which every pose reconstruction pass relies on.

use glam::{Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::common::{initial_capacity, quat_from_xyz};
use crate::error::{Md5Error, Result};
use crate::tokenizer::TokenReader;

/// A named joint with a model-space transform
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Joint {
    name: String,
    parent: Option<usize>,
    /// Model-space position
    pub position: Vec3,
    /// Model-space orientation
    pub orientation: Quat,
}

impl Joint {
    /// Create a joint. The hierarchy is checked when joints are assembled
    /// into a [`Skeleton`].
    pub fn new(
        name: impl Into<String>,
        parent: Option<usize>,
        position: Vec3,
        orientation: Quat,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            position,
            orientation,
        }
    }

    /// Joint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the parent joint, `None` for a root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Parent index as stored in MD5 files (-1 for a root)
    pub fn parent_index(&self) -> i32 {
        self.parent.map_or(-1, |parent| parent as i32)
    }

    /// Whether name and parent match `other`
    pub fn same_topology(&self, other: &Self) -> bool {
        self.name == other.name && self.parent == other.parent
    }

    /// Transform a point from this joint's local space into model space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }
}

/// Convert a parent index read from a file, rejecting forward references
pub(crate) fn checked_parent(
    context: &str,
    name: &str,
    index: usize,
    parent: i32,
) -> Result<Option<usize>> {
    match parent {
        -1 => Ok(None),
        p if p >= 0 && (p as usize) < index => Ok(Some(p as usize)),
        _ => Err(Md5Error::InvalidParent {
            context: context.to_string(),
            joint: name.to_string(),
            index,
            parent,
        }),
    }
}

/// Ordered joint collection forming one pose
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Skeleton {
    joints: Vec<Joint>,
}

impl Skeleton {
    /// Assemble a skeleton, checking that every parent precedes its child
    pub fn from_joints(joints: Vec<Joint>) -> Result<Self> {
        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent
                && parent >= index
            {
                return Err(Md5Error::InvalidParent {
                    context: "skeleton".to_string(),
                    joint: joint.name.clone(),
                    index,
                    parent: parent as i32,
                });
            }
        }
        Ok(Self { joints })
    }

    /// Read `num_joints` joint lines of a `joints { ... }` block.
    ///
    /// Each line is `name parent ( px py pz ) ( qx qy qz )`; anything after
    /// the orientation is ignored.
    pub fn parse<'a, R: TokenReader<'a>>(reader: &mut R, num_joints: usize) -> Result<Self> {
        let context = reader.context().to_string();
        let mut joints = Vec::with_capacity(initial_capacity(num_joints));

        for index in 0..num_joints {
            let name = reader.expect_token("joint name")?;
            let parent: i32 = reader.parse_value("parent index")?;
            let position = reader.parse_vec3("joint position")?;
            let orient = reader.parse_vec3("joint orientation")?;
            reader.rest_of_line();

            let parent = checked_parent(&context, name, index, parent)?;
            joints.push(Joint::new(
                name,
                parent,
                position,
                quat_from_xyz(orient.x, orient.y, orient.z),
            ));
        }

        Ok(Self { joints })
    }

    /// Number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Whether the skeleton has no joints
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joint at `index`
    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// Mutable joint at `index`. Only the transform can be changed.
    pub fn joint_mut(&mut self, index: usize) -> Option<&mut Joint> {
        self.joints.get_mut(index)
    }

    /// All joints in storage order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Index of the joint called `name`
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|joint| joint.name == name)
    }

    /// Describe the first difference in joint count, names or parents
    pub fn topology_mismatch(&self, other: &Self) -> Option<String> {
        if self.joints.len() != other.joints.len() {
            return Some(format!(
                "joint count differs ({} vs {})",
                self.joints.len(),
                other.joints.len()
            ));
        }

        self.joints
            .iter()
            .zip(&other.joints)
            .enumerate()
            .find(|(_, (a, b))| !a.same_topology(b))
            .map(|(index, (a, b))| {
                format!(
                    "joint {index} differs ('{}' parent {} vs '{}' parent {})",
                    a.name,
                    a.parent_index(),
                    b.name,
                    b.parent_index()
                )
            })
    }

    /// Copy every joint transform from `other`, which must share this
    /// skeleton's topology
    pub fn copy_pose_from(&mut self, other: &Self) {
        for (joint, source) in self.joints.iter_mut().zip(&other.joints) {
            joint.position = source.position;
            joint.orientation = source.orientation;
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            joints: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, joint: Joint) {
        self.joints.push(joint);
    }
}
