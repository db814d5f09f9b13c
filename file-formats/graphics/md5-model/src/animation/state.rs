//! Playback state tracking for MD5 objects

use std::sync::Arc;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::anim::Md5Animation;

/// Frame pair and blend factor selected inside one clip
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FrameCursor {
    /// Frame blended from
    pub current: usize,
    /// Frame blended towards
    pub next: usize,
    /// Blend factor between the two, in [0, 1)
    pub remainder: f32,
}

impl FrameCursor {
    /// Map a fraction of a clip's length onto its frames.
    ///
    /// `fraction` 0.0 is the first frame and 1.0 the last one. Past the last
    /// frame both indices wrap to frame 0. Negative or NaN fractions are
    /// treated as 0.
    pub fn from_fraction(fraction: f32, max_frame: usize) -> Self {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.max(0.0) };
        let position = fraction * max_frame as f32;
        let floor = position.floor();

        let mut current = floor as usize;
        let remainder = position - floor;

        if current > max_frame {
            current = 0;
        }
        let next = if current < max_frame { current + 1 } else { 0 };

        Self {
            current,
            next,
            remainder,
        }
    }
}

/// What an object is currently playing
#[derive(Debug, Clone, Default)]
pub enum PlaybackState {
    /// No clip is bound; the pose is the model's bind pose
    #[default]
    Idle,
    /// Blending inside `current`, or from `current` towards `next`
    Playing {
        current: Arc<Md5Animation>,
        next: Arc<Md5Animation>,
    },
}

impl PlaybackState {
    /// Play a single clip
    pub fn playing(clip: Arc<Md5Animation>) -> Self {
        Self::Playing {
            current: Arc::clone(&clip),
            next: clip,
        }
    }

    /// Whether a clip is bound
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// Clip being played
    pub fn current(&self) -> Option<&Arc<Md5Animation>> {
        match self {
            Self::Idle => None,
            Self::Playing { current, .. } => Some(current),
        }
    }

    /// Clip that follows the current one
    pub fn next(&self) -> Option<&Arc<Md5Animation>> {
        match self {
            Self::Idle => None,
            Self::Playing { next, .. } => Some(next),
        }
    }

    /// Whether the object is crossing from one clip into another
    pub fn is_crossing(&self) -> bool {
        match self {
            Self::Idle => false,
            Self::Playing { current, next } => !Arc::ptr_eq(current, next),
        }
    }
}
