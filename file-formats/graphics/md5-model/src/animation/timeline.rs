//! Time-ordered clip schedule
//!
//! Entries are kept sorted by start time. Each covers `[start, start +
//! duration)`; the final entry also includes its end so the last instant
//! still resolves to a clip.

use std::sync::Arc;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::anim::Md5Animation;
use crate::error::{Md5Error, Result};

/// A clip scheduled at a start time (seconds)
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub start: f32,
    pub clip: Arc<Md5Animation>,
}

impl TimelineEntry {
    /// Time at which the clip finishes
    pub fn end(&self) -> f32 {
        self.start + self.clip.duration()
    }
}

/// Result of looking up a time on the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum TimelinePhase {
    /// Inside entry `index`; `fraction` is the elapsed share of its duration
    FinishingCurrent { index: usize, fraction: f32 },
    /// In the gap after entry `index`; `fraction` is the elapsed share of
    /// the gap before entry `index + 1` starts
    EnteringNext { index: usize, fraction: f32 },
    /// Before the first entry, after the last, or on an empty timeline
    NoActiveClip,
}

impl TimelinePhase {
    /// Timeline index of the clip being finished or left
    pub fn index(&self) -> Option<usize> {
        match *self {
            Self::FinishingCurrent { index, .. } | Self::EnteringNext { index, .. } => Some(index),
            Self::NoActiveClip => None,
        }
    }

    /// Blend fraction of the phase
    pub fn fraction(&self) -> Option<f32> {
        match *self {
            Self::FinishingCurrent { fraction, .. } | Self::EnteringNext { fraction, .. } => {
                Some(fraction)
            }
            Self::NoActiveClip => None,
        }
    }
}

/// Ordered list of scheduled clips
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `clip` at `start`, before every entry starting at or after
    /// `start`, and push those entries back by the clip's duration.
    /// Returns the index of the new entry.
    pub fn drop_anim(&mut self, start: f32, clip: Arc<Md5Animation>) -> usize {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.start >= start)
            .unwrap_or(self.entries.len());

        let shift = clip.duration();
        for entry in &mut self.entries[index..] {
            entry.start += shift;
        }

        self.entries.insert(index, TimelineEntry { start, clip });
        index
    }

    /// Remove the entry at `index` without moving the others
    pub fn remove(&mut self, index: usize) -> Result<TimelineEntry> {
        if index >= self.entries.len() {
            return Err(Md5Error::TimelineIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&TimelineEntry) -> bool) {
        self.entries.retain(|entry| keep(entry));
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    /// Clip at `index`
    pub fn clip(&self, index: usize) -> Option<&Arc<Md5Animation>> {
        self.entries.get(index).map(|entry| &entry.clip)
    }

    /// Start time of the entry at `index`
    pub fn start(&self, index: usize) -> Option<f32> {
        self.entries.get(index).map(|entry| entry.start)
    }

    /// All entries in start order
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End time of the last entry, 0.0 when empty
    pub fn total_time(&self) -> f32 {
        self.entries.last().map_or(0.0, TimelineEntry::end)
    }

    /// Find what plays at `time`
    pub fn lookup(&self, time: f32) -> TimelinePhase {
        let Some(first) = self.entries.first() else {
            return TimelinePhase::NoActiveClip;
        };
        if time < first.start {
            return TimelinePhase::NoActiveClip;
        }

        let last = self.entries.len() - 1;
        for (index, entry) in self.entries.iter().enumerate() {
            let end = entry.end();
            let inside = if index == last { time <= end } else { time < end };
            if inside {
                return TimelinePhase::FinishingCurrent {
                    index,
                    fraction: (time - entry.start) / (end - entry.start),
                };
            }

            if let Some(next) = self.entries.get(index + 1)
                && time < next.start
            {
                return TimelinePhase::EnteringNext {
                    index,
                    fraction: (time - end) / (next.start - end),
                };
            }
        }

        TimelinePhase::NoActiveClip
    }
}
