//! Loading, skinning and playback of id Tech 4 MD5 models
//!
//! - [`Md5Model`] loads `.md5mesh` files: a bind-pose skeleton and meshes
//!   whose vertices are built from weighted joint offsets.
//! - [`Md5Animation`] loads `.md5anim` files and expands every frame into a
//!   full pose.
//! - [`animation::Md5Object`] plays clips from a timeline on a shared model
//!   and keeps its own skinned vertex arrays.

pub mod anim;
pub mod animation;
pub mod common;
pub mod error;
pub mod file_resolver;
pub mod mesh;
pub mod model;
pub mod skeleton;
pub mod skinning;
pub mod tokenizer;

// Re-export common types
pub use anim::{JointChannels, Md5Animation};
pub use animation::{ClipKind, Md5Object, TimelinePhase};
pub use common::{BoundingBox, MD5_VERSION};
pub use error::{Md5Error, Result};
pub use file_resolver::{DirectoryResolver, TextureResolver};
pub use mesh::{Mesh, MeshBuffers, RenderState};
pub use model::Md5Model;
pub use skeleton::{Joint, Skeleton};
pub use skinning::SkinningOptions;
pub use tokenizer::{TokenReader, Tokenizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
