//! MD5 animation file (`.md5anim`) decoding
//!
//! An animation file stores a base pose and, per frame, only the joint
//! components that change. Decoding expands every frame into a full
//! model-space [`Skeleton`] up front, so playback is a plain blend between
//! two stored poses.

use std::collections::BTreeMap;
use std::path::Path;

use glam::{Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::common::{
    BoundingBox, check_version, initial_capacity, lerp_vec3, quat_from_xyz, read_text,
};
use crate::error::{Md5Error, Result};
use crate::skeleton::{Joint, Skeleton, checked_parent};
use crate::tokenizer::{TokenReader, Tokenizer};

bitflags::bitflags! {
    /// Joint components animated per frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct JointChannels: u32 {
        /// Position x
        const TX = 0x01;
        /// Position y
        const TY = 0x02;
        /// Position z
        const TZ = 0x04;
        /// Orientation x
        const QX = 0x08;
        /// Orientation y
        const QY = 0x10;
        /// Orientation z
        const QZ = 0x20;
    }
}

impl JointChannels {
    /// Order in which animated values are stored in a frame
    pub const ORDER: [Self; 6] = [Self::TX, Self::TY, Self::TZ, Self::QX, Self::QY, Self::QZ];

    /// Number of values one frame stores for this joint
    pub fn value_count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

/// One line of the `hierarchy` block
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct JointInfo {
    pub name: String,
    pub parent: Option<usize>,
    pub channels: JointChannels,
    /// Offset of this joint's first value in each frame
    pub start_index: usize,
}

/// One line of the `baseframe` block, in parent-relative space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseFrameJoint {
    pub position: Vec3,
    /// x, y and z of the unit orientation quaternion
    pub rotation: Vec3,
}

/// A decoded animation clip
#[derive(Debug, Clone)]
pub struct Md5Animation {
    name: String,
    frame_rate: f32,
    animated_components: usize,
    hierarchy: Vec<JointInfo>,
    frames: Vec<Skeleton>,
    bounds: Vec<BoundingBox>,
    is_transition: bool,
}

impl Md5Animation {
    /// Load an animation file. The clip is named after the file stem.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let mut anim = Self::parse_with_context(&text, &path.display().to_string())?;
        if let Some(stem) = path.file_stem() {
            anim.name = stem.to_string_lossy().into_owned();
        }
        Ok(anim)
    }

    /// Parse animation text, naming the clip `name`
    pub fn parse(text: &str, name: &str) -> Result<Self> {
        Self::parse_with_context(text, name)
    }

    fn parse_with_context(text: &str, context: &str) -> Result<Self> {
        let mut reader = Tokenizer::new(text, context);

        let mut version_seen = false;
        let mut num_frames = 0usize;
        let mut num_joints = 0usize;
        let mut frame_rate = 0.0f32;
        let mut animated_components = 0usize;
        let mut hierarchy = Vec::new();
        let mut base_frame = Vec::new();
        let mut bounds = Vec::new();
        let mut frames = BTreeMap::<usize, Skeleton>::new();
        let mut frame_data = Vec::new();

        while let Some(token) = reader.next_token() {
            match token {
                "MD5Version" => {
                    check_version(&mut reader)?;
                    version_seen = true;
                }
                "numFrames" => {
                    num_frames = reader.parse_value("frame count")?;
                    bounds.reserve(initial_capacity(num_frames));
                }
                "numJoints" => num_joints = reader.parse_value("joint count")?,
                "frameRate" => frame_rate = reader.parse_value("frame rate")?,
                "numAnimatedComponents" => {
                    animated_components = reader.parse_value("animated component count")?;
                    frame_data = Vec::with_capacity(initial_capacity(animated_components));
                }
                "hierarchy" => {
                    reader.expect_literal("{")?;
                    reader.rest_of_line();
                    hierarchy = parse_hierarchy(&mut reader, num_joints)?;
                    reader.expect_literal("}")?;
                }
                "bounds" => {
                    reader.expect_literal("{")?;
                    bounds.clear();
                    for _ in 0..num_frames {
                        let min = reader.parse_vec3("bounds minimum")?;
                        let max = reader.parse_vec3("bounds maximum")?;
                        bounds.push(BoundingBox::new(min, max));
                    }
                    reader.expect_literal("}")?;
                }
                "baseframe" => {
                    reader.expect_literal("{")?;
                    reader.rest_of_line();
                    base_frame.clear();
                    for _ in 0..num_joints {
                        let position = reader.parse_vec3("base frame position")?;
                        let rotation = reader.parse_vec3("base frame orientation")?;
                        reader.rest_of_line();
                        base_frame.push(BaseFrameJoint { position, rotation });
                    }
                    reader.expect_literal("}")?;
                }
                "frame" => {
                    let index: usize = reader.parse_value("frame index")?;
                    reader.expect_literal("{")?;

                    frame_data.clear();
                    for _ in 0..animated_components {
                        frame_data.push(reader.parse_value("animated component")?);
                    }
                    reader.expect_literal("}")?;

                    if index >= num_frames {
                        return Err(Md5Error::invalid_data(
                            context,
                            format!("frame {index} is out of range (numFrames {num_frames})"),
                        ));
                    }
                    if frames.contains_key(&index) {
                        return Err(Md5Error::invalid_data(
                            context,
                            format!("frame {index} appears twice"),
                        ));
                    }
                    if hierarchy.len() != num_joints || base_frame.len() != num_joints {
                        return Err(Md5Error::invalid_data(
                            context,
                            format!("frame {index} precedes the hierarchy or baseframe block"),
                        ));
                    }

                    let frame = build_frame_skeleton(&hierarchy, &base_frame, &frame_data, context)?;
                    frames.insert(index, frame);
                }
                _ => {
                    reader.rest_of_line();
                }
            }
        }

        if !version_seen {
            return Err(Md5Error::UnexpectedEof {
                context: context.to_string(),
                expected: "MD5Version header".to_string(),
            });
        }
        if bounds.len() != num_frames {
            return Err(Md5Error::invalid_data(
                context,
                format!("{} bounds for {num_frames} frames", bounds.len()),
            ));
        }

        if frames.len() != num_frames {
            let missing = (0..num_frames)
                .find(|index| !frames.contains_key(index))
                .unwrap_or(frames.len());
            return Err(Md5Error::invalid_data(
                context,
                format!("frame {missing} is missing"),
            ));
        }
        let frames: Vec<Skeleton> = frames.into_values().collect();

        let mut anim = Self::from_frames(context, frame_rate, frames, bounds)?;
        anim.animated_components = animated_components;
        anim.hierarchy = hierarchy;

        log::debug!(
            "{}: {} frames at {} fps, {} joints, {} animated components",
            context,
            anim.frame_count(),
            anim.frame_rate,
            num_joints,
            animated_components
        );

        Ok(anim)
    }

    /// Build a clip from already-posed frames. All frames must share one
    /// joint topology and `bounds` must hold one box per frame.
    pub fn from_frames(
        name: impl Into<String>,
        frame_rate: f32,
        frames: Vec<Skeleton>,
        bounds: Vec<BoundingBox>,
    ) -> Result<Self> {
        let name = name.into();

        if frames.is_empty() {
            return Err(Md5Error::invalid_data(&name, "animation has no frames"));
        }
        if frame_rate.is_nan() || frame_rate <= 0.0 {
            return Err(Md5Error::invalid_data(
                &name,
                format!("frame rate must be positive, got {frame_rate}"),
            ));
        }
        if bounds.len() != frames.len() {
            return Err(Md5Error::invalid_data(
                &name,
                format!("{} bounds for {} frames", bounds.len(), frames.len()),
            ));
        }
        if let Some((index, reason)) = frames
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(index, frame)| frames[0].topology_mismatch(frame).map(|r| (index, r)))
        {
            return Err(Md5Error::invalid_data(
                &name,
                format!("frame {index} does not match frame 0: {reason}"),
            ));
        }

        let hierarchy = frames[0]
            .joints()
            .iter()
            .map(|joint| JointInfo {
                name: joint.name().to_string(),
                parent: joint.parent(),
                channels: JointChannels::empty(),
                start_index: 0,
            })
            .collect();

        Ok(Self {
            name,
            frame_rate,
            animated_components: 0,
            hierarchy,
            frames,
            bounds,
            is_transition: false,
        })
    }

    /// Blend frames `a` and `b` of this clip into `out`: positions are
    /// lerped and orientations slerped. `t` is not clamped.
    pub fn interpolate_frames(&self, a: usize, b: usize, t: f32, out: &mut Skeleton) -> Result<()> {
        blend_poses(self.frame_checked(a)?, self.frame_checked(b)?, t, out)
    }

    /// Blend from the last frame of `from` to the first frame of `to`
    pub fn interpolate_anims(from: &Self, to: &Self, t: f32, out: &mut Skeleton) -> Result<()> {
        blend_poses(from.last_frame(), to.first_frame(), t, out)
    }

    /// Frame bounds blended like [`Self::interpolate_frames`]
    pub fn interpolate_bounds(&self, a: usize, b: usize, t: f32) -> Result<BoundingBox> {
        let bounds_a = self.bounds.get(a).ok_or_else(|| self.frame_error(a))?;
        let bounds_b = self.bounds.get(b).ok_or_else(|| self.frame_error(b))?;
        Ok(bounds_a.lerp(bounds_b, t))
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames per second
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Number of frames, at least one
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the last frame
    pub fn max_frame(&self) -> usize {
        self.frames.len() - 1
    }

    /// Playing time in seconds
    pub fn duration(&self) -> f32 {
        self.frames.len() as f32 / self.frame_rate
    }

    /// Number of joints per frame
    pub fn joint_count(&self) -> usize {
        self.first_frame().joint_count()
    }

    /// Values stored per frame in the source file (0 for synthetic clips)
    pub fn animated_components(&self) -> usize {
        self.animated_components
    }

    /// Joint descriptions from the `hierarchy` block
    pub fn hierarchy(&self) -> &[JointInfo] {
        &self.hierarchy
    }

    /// Pose of frame `index`
    pub fn frame(&self, index: usize) -> Option<&Skeleton> {
        self.frames.get(index)
    }

    /// Bounds of frame `index`
    pub fn frame_bounds(&self, index: usize) -> Option<&BoundingBox> {
        self.bounds.get(index)
    }

    /// Whether the clip is only played between two other clips
    pub fn is_transition(&self) -> bool {
        self.is_transition
    }

    /// Mark the clip as a transition
    pub fn set_transition(&mut self, is_transition: bool) {
        self.is_transition = is_transition;
    }

    fn first_frame(&self) -> &Skeleton {
        &self.frames[0]
    }

    fn last_frame(&self) -> &Skeleton {
        &self.frames[self.frames.len() - 1]
    }

    fn frame_checked(&self, index: usize) -> Result<&Skeleton> {
        self.frames.get(index).ok_or_else(|| self.frame_error(index))
    }

    fn frame_error(&self, index: usize) -> Md5Error {
        Md5Error::FrameOutOfRange {
            animation: self.name.clone(),
            index,
            frames: self.frames.len(),
        }
    }
}

fn parse_hierarchy<'a, R: TokenReader<'a>>(reader: &mut R, num_joints: usize) -> Result<Vec<JointInfo>> {
    let context = reader.context().to_string();
    let mut hierarchy = Vec::with_capacity(initial_capacity(num_joints));

    for index in 0..num_joints {
        let name = reader.expect_token("joint name")?;
        let parent: i32 = reader.parse_value("parent index")?;
        let flags: u32 = reader.parse_value("joint flags")?;
        let start_index = reader.parse_value("start index")?;
        reader.rest_of_line();

        let parent = checked_parent(&context, name, index, parent)?;
        let channels = JointChannels::from_bits(flags).ok_or_else(|| {
            Md5Error::invalid_data(
                &context,
                format!("joint {index} ('{name}') has unknown channel flags {flags:#x}"),
            )
        })?;

        hierarchy.push(JointInfo {
            name: name.to_string(),
            parent,
            channels,
            start_index,
        });
    }

    Ok(hierarchy)
}

/// Expand one frame's animated values into a model-space pose.
///
/// Each joint starts from its base frame transform, has its animated
/// components overwritten in `tx ty tz qx qy qz` order from
/// `data[start_index..]`, and is then composed with its already-built
/// parent.
pub fn build_frame_skeleton(
    hierarchy: &[JointInfo],
    base_frame: &[BaseFrameJoint],
    data: &[f32],
    context: &str,
) -> Result<Skeleton> {
    let mut skeleton = Skeleton::with_capacity(hierarchy.len());

    for (index, (info, base)) in hierarchy.iter().zip(base_frame).enumerate() {
        let count = info.channels.value_count();
        let values = info
            .start_index
            .checked_add(count)
            .and_then(|end| data.get(info.start_index..end))
            .ok_or_else(|| {
                Md5Error::invalid_data(
                    context,
                    format!(
                        "joint {index} ('{}') reads {count} values from {} but frames hold {}",
                        info.name,
                        info.start_index,
                        data.len()
                    ),
                )
            })?;

        let mut components = [
            base.position.x,
            base.position.y,
            base.position.z,
            base.rotation.x,
            base.rotation.y,
            base.rotation.z,
        ];
        let mut values = values.iter().copied();
        for (component, channel) in components.iter_mut().zip(JointChannels::ORDER) {
            if info.channels.contains(channel)
                && let Some(value) = values.next()
            {
                *component = value;
            }
        }

        let [px, py, pz, qx, qy, qz] = components;
        let local_position = Vec3::new(px, py, pz);
        let local_orientation = quat_from_xyz(qx, qy, qz);

        let (position, orientation) = match info.parent {
            None => (local_position, local_orientation),
            Some(parent) => {
                // parents precede children, so this joint's parent is built
                let parent = &skeleton.joints()[parent];
                (
                    parent.transform_point(local_position),
                    (parent.orientation * local_orientation).normalize(),
                )
            }
        };

        skeleton.push(Joint::new(info.name.as_str(), info.parent, position, orientation));
    }

    Ok(skeleton)
}

fn blend_poses(a: &Skeleton, b: &Skeleton, t: f32, out: &mut Skeleton) -> Result<()> {
    let required = a.joint_count().max(b.joint_count());
    if out.joint_count() != required {
        return Err(Md5Error::JointCountMismatch {
            required,
            found: out.joint_count(),
        });
    }
    if !(0.0..=1.0).contains(&t) {
        log::trace!("Extrapolating poses with fraction {t}");
    }

    for (index, (joint_a, joint_b)) in a.joints().iter().zip(b.joints()).enumerate() {
        if let Some(joint) = out.joint_mut(index) {
            joint.position = lerp_vec3(joint_a.position, joint_b.position, t);
            joint.orientation = slerp(joint_a.orientation, joint_b.orientation, t);
        }
    }
    Ok(())
}

fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    if a == b { a } else { a.slerp(b, t) }
}
