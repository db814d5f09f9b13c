//! Texture resolution for MD5 shader names
//!
//! MD5 meshes reference their material through a `shader` string, usually a
//! path without extension such as `models/monsters/imp/imp`. Loading the image
//! behind it is left to the caller; this module only turns shader names into
//! files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Md5Error, Result};

/// Trait for resolving shader names to texture files
pub trait TextureResolver {
    /// Resolve a shader name to an existing file path
    fn resolve_texture(&self, shader: &str) -> Result<PathBuf>;

    /// Load the raw bytes of the texture behind `shader`
    fn load_texture(&self, shader: &str) -> Result<Vec<u8>> {
        let path = self.resolve_texture(shader)?;
        fs::read(&path).map_err(|source| Md5Error::Open { path, source })
    }
}

/// Resolver that looks for shader paths below a base directory, trying a
/// list of image extensions in order
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    base_path: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryResolver {
    /// Extensions tried when none are configured
    pub const DEFAULT_EXTENSIONS: [&'static str; 4] = ["tga", "png", "jpg", "dds"];

    /// Create a resolver rooted at `base_path` using the default extensions
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            extensions: Self::DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }

    /// Replace the list of extensions to try
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Base directory
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Candidate paths for `shader`, in lookup order
    pub fn candidates(&self, shader: &str) -> Vec<PathBuf> {
        let relative = shader.trim_start_matches(['/', '\\']).replace('\\', "/");
        let stem = self.base_path.join(&relative);

        let mut candidates = Vec::with_capacity(self.extensions.len() + 1);
        if Path::new(&relative).extension().is_some() {
            candidates.push(stem.clone());
        }
        for ext in &self.extensions {
            candidates.push(stem.with_extension(ext));
        }
        candidates
    }
}

impl TextureResolver for DirectoryResolver {
    fn resolve_texture(&self, shader: &str) -> Result<PathBuf> {
        self.candidates(shader)
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(|| Md5Error::TextureNotFound {
                shader: shader.to_string(),
            })
    }
}
