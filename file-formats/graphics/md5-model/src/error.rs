use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for MD5 model and animation loading and playback
#[derive(Error, Debug)]
pub enum Md5Error {
    /// The file could not be opened or read
    #[error("Couldn't open file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The `MD5Version` header does not match the supported version
    #[error("{context}: unsupported MD5 version {found}, expected {expected}")]
    UnsupportedVersion {
        context: String,
        found: i32,
        expected: i32,
    },

    /// The input ended in the middle of a block
    #[error("{context}: unexpected end of input while reading {expected}")]
    UnexpectedEof { context: String, expected: String },

    /// A token did not have the expected shape
    #[error("{context}: line {line}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        context: String,
        line: usize,
        expected: String,
        found: String,
    },

    /// Structurally valid tokens describing inconsistent data
    #[error("{context}: {message}")]
    InvalidData { context: String, message: String },

    /// A joint references a parent that is not defined before it
    #[error("{context}: joint {index} ('{joint}') has invalid parent index {parent}")]
    InvalidParent {
        context: String,
        joint: String,
        index: usize,
        parent: i32,
    },

    /// An animation does not match a model's skeleton
    #[error("Animation '{animation}' is incompatible with the model: {reason}")]
    IncompatibleAnimation { animation: String, reason: String },

    /// A pose does not hold enough joints for the mesh being skinned
    #[error("Pose has {found} joints, at least {required} are required")]
    JointCountMismatch { required: usize, found: usize },

    /// Per-mesh vertex arrays passed for a model with a different mesh count
    #[error("Model has {meshes} meshes but {buffers} vertex buffers were passed")]
    BufferCountMismatch { meshes: usize, buffers: usize },

    /// A frame index past the end of an animation
    #[error("Animation '{animation}' has {frames} frames, frame {index} requested")]
    FrameOutOfRange {
        animation: String,
        index: usize,
        frames: usize,
    },

    /// No animation with this name is registered
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    /// The object has no model bound yet
    #[error("No model is bound to this object")]
    NoModel,

    /// A timeline position is out of range
    #[error("Timeline index {index} out of range (timeline has {len} entries)")]
    TimelineIndex { index: usize, len: usize },

    /// A shader name could not be resolved to a texture file
    #[error("Texture not found for shader '{shader}'")]
    TextureNotFound { shader: String },
}

impl Md5Error {
    /// Whether this error aborted a model or animation load
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Open { .. }
                | Self::UnsupportedVersion { .. }
                | Self::UnexpectedEof { .. }
                | Self::UnexpectedToken { .. }
                | Self::InvalidData { .. }
                | Self::InvalidParent { .. }
        )
    }

    /// Whether this error rejected an animation for a model
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::IncompatibleAnimation { .. })
    }

    pub(crate) fn invalid_data(context: &str, message: impl Into<String>) -> Self {
        Self::InvalidData {
            context: context.to_string(),
            message: message.into(),
        }
    }
}

/// Result type using Md5Error
pub type Result<T> = std::result::Result<T, Md5Error>;
