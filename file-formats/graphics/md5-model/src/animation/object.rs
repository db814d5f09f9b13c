//! Animated instances of an MD5 model
//!
//! An [`Md5Object`] binds one shared [`Md5Model`] to its own pose, its own
//! skinned vertex arrays, a clip library and a timeline. Several objects may
//! share one model and be animated independently.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use glam::{Mat4, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use super::state::{FrameCursor, PlaybackState};
use super::timeline::{Timeline, TimelinePhase};
use crate::anim::Md5Animation;
use crate::common::BoundingBox;
use crate::error::{Md5Error, Result};
use crate::mesh::{MeshBuffers, RenderState};
use crate::model::Md5Model;
use crate::skeleton::Skeleton;

/// Library an added clip goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    /// Selectable by name and schedulable on the timeline
    Playable,
    /// Only played between two playable clips
    Transition,
}

/// Bounding box in object space with the transform placing it in the world
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct OrientedBox {
    pub world: Mat4,
    pub center: Vec3,
    /// Half-size along each local axis
    pub extent: Vec3,
}

impl OrientedBox {
    /// Place an axis-aligned box with `world`
    pub fn from_aabb(world: Mat4, bounds: &BoundingBox) -> Self {
        Self {
            world,
            center: bounds.center(),
            extent: bounds.extent(),
        }
    }
}

impl Default for OrientedBox {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            center: Vec3::ZERO,
            extent: Vec3::ZERO,
        }
    }
}

/// A live animation instance
#[derive(Debug, Clone, Default)]
pub struct Md5Object {
    model: Option<Arc<Md5Model>>,
    pose: Skeleton,
    buffers: Vec<MeshBuffers>,
    clips: BTreeMap<String, Arc<Md5Animation>>,
    transition_clips: BTreeMap<String, Arc<Md5Animation>>,
    /// predecessor -> successor -> transition clip name
    transitions: BTreeMap<String, BTreeMap<String, String>>,
    current_name: Option<String>,
    timeline: Timeline,
    state: PlaybackState,
    cursor: FrameCursor,
    animated_bounds: Option<BoundingBox>,
    transform: Mat4,
    bounding_box: OrientedBox,
}

impl Md5Object {
    /// Create an object with no model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object bound to `model`, posed in its bind pose
    pub fn with_model(model: Arc<Md5Model>) -> Self {
        let mut object = Self::new();
        object.set_model(model);
        object
    }

    /// Bind a model. Rebinding the same model does nothing; otherwise the
    /// pose restarts from the new bind pose and clips that no longer fit
    /// the skeleton are discarded.
    pub fn set_model(&mut self, model: Arc<Md5Model>) {
        if self
            .model
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &model))
        {
            return;
        }

        self.pose = model.base_skeleton().clone();
        self.buffers = model.bind_pose_buffers();

        let discard_incompatible = |library: &mut BTreeMap<String, Arc<Md5Animation>>| {
            library.retain(|_, clip| match model.validate_animation(clip) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("{err}; animation discarded");
                    false
                }
            });
        };
        discard_incompatible(&mut self.clips);
        discard_incompatible(&mut self.transition_clips);

        let clips = &self.clips;
        let transition_clips = &self.transition_clips;
        self.transitions.retain(|from, targets| {
            targets.retain(|to, transition| {
                clips.contains_key(to) && transition_clips.contains_key(transition)
            });
            clips.contains_key(from) && !targets.is_empty()
        });
        self.timeline
            .retain(|entry| model.validity_check(&entry.clip));

        self.current_name = None;
        self.state = PlaybackState::Idle;
        self.cursor = FrameCursor::default();
        self.animated_bounds = None;
        self.model = Some(model);
    }

    /// Bound model
    pub fn model(&self) -> Option<&Arc<Md5Model>> {
        self.model.as_ref()
    }

    /// Add a clip to the playable or transition library, replacing any clip
    /// of the same name. Clips that don't match the model's skeleton are
    /// rejected and dropped.
    pub fn add_animation(&mut self, mut clip: Md5Animation, kind: ClipKind) -> Result<Arc<Md5Animation>> {
        let model = self.model.as_ref().ok_or(Md5Error::NoModel)?;
        if let Err(err) = model.validate_animation(&clip) {
            log::warn!("{err}; animation discarded");
            return Err(err);
        }

        clip.set_transition(kind == ClipKind::Transition);
        let clip = Arc::new(clip);
        let library = match kind {
            ClipKind::Playable => &mut self.clips,
            ClipKind::Transition => &mut self.transition_clips,
        };
        if library
            .insert(clip.name().to_string(), Arc::clone(&clip))
            .is_some()
        {
            log::debug!("Replaced animation '{}'", clip.name());
        }

        Ok(clip)
    }

    /// Load an animation file and add it like [`Self::add_animation`]
    pub fn add_animation_file<P: AsRef<Path>>(&mut self, path: P, kind: ClipKind) -> Result<Arc<Md5Animation>> {
        let clip = Md5Animation::load(path)?;
        self.add_animation(clip, kind)
    }

    /// Play `transition` whenever the timeline moves from `from` to `to`
    pub fn register_transition(&mut self, from: &str, to: &str, transition: &str) -> Result<()> {
        for name in [from, to] {
            if !self.clips.contains_key(name) {
                return Err(Md5Error::UnknownAnimation(name.to_string()));
            }
        }
        if !self.transition_clips.contains_key(transition) {
            return Err(Md5Error::UnknownAnimation(transition.to_string()));
        }

        self.transitions
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), transition.to_string());
        Ok(())
    }

    /// Transition clip registered between two playable clips
    pub fn transition_between(&self, from: &str, to: &str) -> Option<&Arc<Md5Animation>> {
        let name = self.transitions.get(from)?.get(to)?;
        self.transition_clips.get(name)
    }

    /// Transition clip between timeline entries `index` and `index + 1`
    pub fn get_transition(&self, index: usize) -> Option<&Arc<Md5Animation>> {
        let from = self.timeline.clip(index)?;
        let to = self.timeline.clip(index + 1)?;
        self.transition_between(from.name(), to.name())
    }

    /// Playable clip called `name`
    pub fn anim(&self, name: &str) -> Option<&Arc<Md5Animation>> {
        self.clips.get(name)
    }

    /// Transition clip called `name`
    pub fn transition_anim(&self, name: &str) -> Option<&Arc<Md5Animation>> {
        self.transition_clips.get(name)
    }

    /// Playable clip at `index` in name order
    pub fn anim_by_index(&self, index: usize) -> Option<&Arc<Md5Animation>> {
        self.clips.values().nth(index)
    }

    /// Playable clips in name order
    pub fn anims(&self) -> impl Iterator<Item = &Arc<Md5Animation>> {
        self.clips.values()
    }

    /// Number of playable clips
    pub fn anim_count(&self) -> usize {
        self.clips.len()
    }

    /// Play the clip called `name`. An unknown name returns the object to
    /// its bind pose and returns false.
    pub fn set_anim(&mut self, name: &str) -> bool {
        match self.clips.get(name) {
            Some(clip) => {
                self.state = PlaybackState::playing(Arc::clone(clip));
                self.current_name = Some(name.to_string());
                true
            }
            None => {
                self.reset_pose();
                false
            }
        }
    }

    /// Switch to the clip after the current one in name order. At the last
    /// clip the current one is kept.
    pub fn next_anim(&mut self) -> Option<Arc<Md5Animation>> {
        let next = {
            let current = self.current_name.as_deref()?;
            self.clips
                .range::<str, _>((Bound::Excluded(current), Bound::Unbounded))
                .next()
                .map(|(_, clip)| Arc::clone(clip))
        };

        match next {
            Some(clip) => {
                self.current_name = Some(clip.name().to_string());
                self.state = PlaybackState::playing(Arc::clone(&clip));
                Some(clip)
            }
            None => self.state.current().cloned(),
        }
    }

    /// Clip being played
    pub fn current_anim(&self) -> Option<&Arc<Md5Animation>> {
        self.state.current()
    }

    /// Schedule the clip called `name` at `start`; see
    /// [`Timeline::drop_anim`]. Returns the timeline index.
    pub fn drop_anim(&mut self, start: f32, name: &str) -> Result<usize> {
        let clip = self
            .clips
            .get(name)
            .or_else(|| self.transition_clips.get(name))
            .cloned()
            .ok_or_else(|| Md5Error::UnknownAnimation(name.to_string()))?;
        Ok(self.timeline.drop_anim(start, clip))
    }

    /// Remove timeline entry `index`; later entries keep their start
    pub fn delete_anim(&mut self, index: usize) -> Result<()> {
        self.timeline.remove(index).map(|_| ())
    }

    /// The schedule
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Clip at timeline position `index`
    pub fn timeline_anim(&self, index: usize) -> Option<&Arc<Md5Animation>> {
        self.timeline.clip(index)
    }

    /// Start time of timeline position `index`
    pub fn timeline_start(&self, index: usize) -> Option<f32> {
        self.timeline.start(index)
    }

    /// End of the last scheduled clip
    pub fn total_time(&self) -> f32 {
        self.timeline.total_time()
    }

    /// Select the current and next clip for timeline time `time`
    pub fn update_cur_next_anims(&mut self, time: f32) -> TimelinePhase {
        let phase = self.timeline.lookup(time);

        self.state = match phase {
            TimelinePhase::FinishingCurrent { index, .. } => self
                .timeline
                .clip(index)
                .map_or(PlaybackState::Idle, |clip| PlaybackState::playing(Arc::clone(clip))),
            TimelinePhase::EnteringNext { index, .. } => {
                match (self.timeline.clip(index), self.timeline.clip(index + 1)) {
                    (Some(current), Some(next)) => PlaybackState::Playing {
                        current: Arc::clone(current),
                        next: Arc::clone(next),
                    },
                    _ => PlaybackState::Idle,
                }
            }
            TimelinePhase::NoActiveClip => PlaybackState::Idle,
        };
        self.current_name = self.state.current().map(|clip| clip.name().to_string());

        phase
    }

    /// Select frames for `fraction` of the current clip's length
    pub fn animate(&mut self, fraction: f32) -> FrameCursor {
        if let Some(current) = self.state.current() {
            self.cursor = FrameCursor::from_fraction(fraction, current.max_frame());
            self.animated_bounds = current
                .interpolate_bounds(self.cursor.current, self.cursor.next, self.cursor.remainder)
                .ok();
        }
        self.cursor
    }

    /// Pose the skeleton from the current clip and frame cursor, then
    /// re-skin the meshes
    pub fn prepare(&mut self) -> Result<()> {
        let model = Arc::clone(self.model.as_ref().ok_or(Md5Error::NoModel)?);
        self.pose_from_cursor(&model)?;
        model.prepare(&self.pose, &mut self.buffers)
    }

    /// Advance to timeline time `time`: pick clips, blend the pose and
    /// re-skin the meshes
    pub fn animate_final(&mut self, time: f32) -> Result<TimelinePhase> {
        let model = Arc::clone(self.model.as_ref().ok_or(Md5Error::NoModel)?);

        let phase = self.update_cur_next_anims(time);
        match phase {
            TimelinePhase::FinishingCurrent { fraction, .. } => {
                self.animate(fraction);
                self.pose_from_cursor(&model)?;
            }
            TimelinePhase::EnteringNext { index, fraction } => {
                self.blend_into_next(index, fraction)?;
            }
            TimelinePhase::NoActiveClip => {
                self.animated_bounds = None;
                self.pose.copy_pose_from(model.base_skeleton());
            }
        }

        model.prepare(&self.pose, &mut self.buffers)?;
        Ok(phase)
    }

    /// Compute the object's box from the current frame bounds, or the
    /// model's bind pose box when idle
    pub fn compute_bounding_box(&mut self) -> Result<OrientedBox> {
        let model = self.model.as_ref().ok_or(Md5Error::NoModel)?;
        let bounds = match (&self.state, self.animated_bounds) {
            (PlaybackState::Playing { .. }, Some(bounds)) => bounds,
            _ => *model.bind_pose_bounding_box(),
        };
        self.bounding_box = OrientedBox::from_aabb(self.transform, &bounds);
        Ok(self.bounding_box)
    }

    /// Box from the last [`Self::compute_bounding_box`]
    pub fn bounding_box(&self) -> &OrientedBox {
        &self.bounding_box
    }

    /// Change a mesh's render state. A model shared with other objects is
    /// copied first, so the change only affects this object.
    pub fn set_mesh_render_state(&mut self, name: &str, state: RenderState) -> bool {
        match self.model.as_mut() {
            Some(model) => Arc::make_mut(model).set_mesh_render_state(name, state),
            None => false,
        }
    }

    /// Current pose
    pub fn pose(&self) -> &Skeleton {
        &self.pose
    }

    /// Skinned arrays, one per model mesh
    pub fn buffers(&self) -> &[MeshBuffers] {
        &self.buffers
    }

    /// Playback state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Frames selected by the last update
    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    /// Object to world transform
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Set the object to world transform
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    fn reset_pose(&mut self) {
        self.current_name = None;
        self.state = PlaybackState::Idle;
        self.animated_bounds = None;
        if let Some(model) = &self.model {
            self.pose.copy_pose_from(model.base_skeleton());
            self.buffers = model.bind_pose_buffers();
        }
    }

    fn pose_from_cursor(&mut self, model: &Md5Model) -> Result<()> {
        match &self.state {
            PlaybackState::Idle => self.pose.copy_pose_from(model.base_skeleton()),
            PlaybackState::Playing { current, .. } => current.interpolate_frames(
                self.cursor.current,
                self.cursor.next,
                self.cursor.remainder,
                &mut self.pose,
            )?,
        }
        Ok(())
    }

    fn blend_into_next(&mut self, index: usize, fraction: f32) -> Result<()> {
        let (current, next) = match &self.state {
            PlaybackState::Playing { current, next } => (Arc::clone(current), Arc::clone(next)),
            PlaybackState::Idle => return Ok(()),
        };

        if let Some(transition) = self.get_transition(index).cloned() {
            log::trace!(
                "Playing transition '{}' from '{}' to '{}'",
                transition.name(),
                current.name(),
                next.name()
            );
            let cursor = FrameCursor::from_fraction(fraction, transition.max_frame());
            transition.interpolate_frames(cursor.current, cursor.next, cursor.remainder, &mut self.pose)?;
            self.animated_bounds = transition
                .interpolate_bounds(cursor.current, cursor.next, cursor.remainder)
                .ok();
            self.cursor = cursor;
        } else {
            Md5Animation::interpolate_anims(&current, &next, fraction, &mut self.pose)?;
            self.animated_bounds = current
                .frame_bounds(current.max_frame())
                .zip(next.frame_bounds(0))
                .map(|(from, to)| from.lerp(to, fraction));
            self.cursor = FrameCursor {
                current: current.max_frame(),
                next: 0,
                remainder: fraction,
            };
        }
        Ok(())
    }
}
