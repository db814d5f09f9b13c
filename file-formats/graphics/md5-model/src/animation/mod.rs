//! MD5 animation playback
//!
//! This module drives skinned models over time:
//! - Timeline of clips scheduled at start times
//! - Frame selection inside a clip and blending across clip boundaries
//! - Optional transition clips between named clip pairs
//! - Per-object pose and vertex arrays over a shared model
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use md5_model::Md5Model;
//! use md5_model::animation::{ClipKind, Md5Object, TimelinePhase};
//!
//! # fn main() -> md5_model::Result<()> {
//! let model = Arc::new(Md5Model::load("models/imp.md5mesh")?);
//! let mut object = Md5Object::with_model(model);
//!
//! object.add_animation_file("models/idle.md5anim", ClipKind::Playable)?;
//! object.add_animation_file("models/walk.md5anim", ClipKind::Playable)?;
//! object.drop_anim(0.0, "idle")?;
//! object.drop_anim(object.total_time(), "walk")?;
//!
//! if let TimelinePhase::FinishingCurrent { index, .. } = object.animate_final(0.5)? {
//!     println!("playing timeline entry {index}");
//! }
//! let skinned = object.buffers();
//! # let _ = skinned;
//! # Ok(())
//! # }
//! ```

mod object;
mod state;
mod timeline;

pub use object::{ClipKind, Md5Object, OrientedBox};
pub use state::{FrameCursor, PlaybackState};
pub use timeline::{Timeline, TimelineEntry, TimelinePhase};
