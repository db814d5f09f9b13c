//! MD5 mesh file (`.md5mesh`) loading
//!
//! An [`Md5Model`] is immutable after loading apart from per-mesh render
//! states. Live instances share it behind an `Arc` and keep their own pose
//! and vertex arrays (see [`crate::animation::Md5Object`]).

use std::path::{Path, PathBuf};

use crate::anim::Md5Animation;
use crate::common::{BoundingBox, check_version, initial_capacity, read_text};
use crate::error::{Md5Error, Result};
use crate::file_resolver::TextureResolver;
use crate::mesh::{Mesh, MeshBuffers, RenderState};
use crate::skeleton::Skeleton;
use crate::skinning::SkinningOptions;
use crate::tokenizer::{TokenReader, Tokenizer};

/// A skinned model: meshes sharing one bind-pose skeleton
#[derive(Debug, Clone)]
pub struct Md5Model {
    name: String,
    base_skeleton: Skeleton,
    meshes: Vec<Mesh>,
    bind_pose_box: BoundingBox,
}

impl Md5Model {
    /// Load a model from a file using default options
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_options(path, &SkinningOptions::default())
    }

    /// Load a model from a file
    pub fn load_with_options<P: AsRef<Path>>(path: P, options: &SkinningOptions) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path)?;
        let mut model = Self::parse_with_options(&text, &path.display().to_string(), options)?;
        if let Some(stem) = path.file_stem() {
            model.name = stem.to_string_lossy().into_owned();
        }
        Ok(model)
    }

    /// Parse model text using default options. `context` names the source
    /// in error messages.
    pub fn parse(text: &str, context: &str) -> Result<Self> {
        Self::parse_with_options(text, context, &SkinningOptions::default())
    }

    /// Parse model text
    pub fn parse_with_options(text: &str, context: &str, options: &SkinningOptions) -> Result<Self> {
        let mut reader = Tokenizer::new(text, context);

        let mut version_seen = false;
        let mut num_joints = 0usize;
        let mut num_meshes = None::<usize>;
        let mut base_skeleton = None::<Skeleton>;
        let mut meshes = Vec::new();

        while let Some(token) = reader.next_token() {
            match token {
                "MD5Version" => {
                    check_version(&mut reader)?;
                    version_seen = true;
                }
                "numJoints" => num_joints = reader.parse_value("joint count")?,
                "numMeshes" => {
                    let count = reader.parse_value("mesh count")?;
                    meshes.reserve(initial_capacity(count));
                    num_meshes = Some(count);
                }
                "joints" => {
                    reader.expect_literal("{")?;
                    reader.rest_of_line();
                    base_skeleton = Some(Skeleton::parse(&mut reader, num_joints)?);
                    reader.expect_literal("}")?;
                }
                "mesh" => {
                    let skeleton = base_skeleton.as_ref().ok_or_else(|| {
                        Md5Error::invalid_data(context, "mesh block before the joints block")
                    })?;
                    reader.expect_literal("{")?;
                    reader.rest_of_line();

                    let mut mesh = Mesh::parse(&mut reader, skeleton.joint_count())?;
                    mesh.check_weights(options);
                    mesh.compute_bounding_box(skeleton)?;
                    mesh.compute_weight_normals(skeleton)?;
                    if options.compute_tangents {
                        mesh.compute_weight_tangents(skeleton)?;
                    }
                    mesh.setup_vertex_arrays(skeleton)?;

                    log::debug!(
                        "{}: mesh '{}' with {} vertices, {} triangles, {} weights",
                        context,
                        mesh.name(),
                        mesh.vertices().len(),
                        mesh.triangles().len(),
                        mesh.weights().len()
                    );
                    meshes.push(mesh);
                }
                // commandline and unknown keywords carry nothing we use
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
        let base_skeleton = base_skeleton.ok_or_else(|| Md5Error::UnexpectedEof {
            context: context.to_string(),
            expected: "joints block".to_string(),
        })?;
        if let Some(declared) = num_meshes
            && declared != meshes.len()
        {
            return Err(Md5Error::invalid_data(
                context,
                format!("numMeshes declares {declared} meshes but {} were read", meshes.len()),
            ));
        }

        let bind_pose_box = meshes
            .iter()
            .fold(BoundingBox::EMPTY, |acc, mesh| acc.union(mesh.bounding_box()));

        Ok(Self {
            name: context.to_string(),
            base_skeleton,
            meshes,
            bind_pose_box,
        })
    }

    /// Re-skin every non-hidden mesh for `skeleton` into `buffers`, one
    /// entry per mesh
    pub fn prepare(&self, skeleton: &Skeleton, buffers: &mut [MeshBuffers]) -> Result<()> {
        if buffers.len() != self.meshes.len() {
            return Err(Md5Error::BufferCountMismatch {
                meshes: self.meshes.len(),
                buffers: buffers.len(),
            });
        }
        for (mesh, buffers) in self.meshes.iter().zip(buffers.iter_mut()) {
            if mesh.render_state().is_skinned() {
                mesh.skin_into(skeleton, buffers)?;
            }
        }
        Ok(())
    }

    /// Fresh per-mesh arrays holding the bind pose
    pub fn bind_pose_buffers(&self) -> Vec<MeshBuffers> {
        self.meshes.iter().map(|mesh| mesh.buffers().clone()).collect()
    }

    /// Whether `anim` can drive this model's skeleton
    pub fn validity_check(&self, anim: &Md5Animation) -> bool {
        self.validate_animation(anim).is_ok()
    }

    /// Like [`Self::validity_check`], describing the mismatch
    pub fn validate_animation(&self, anim: &Md5Animation) -> Result<()> {
        let reason = match anim.frame(0) {
            Some(frame) => self.base_skeleton.topology_mismatch(frame),
            None => Some("animation has no frames".to_string()),
        };

        match reason {
            None => Ok(()),
            Some(reason) => Err(Md5Error::IncompatibleAnimation {
                animation: anim.name().to_string(),
                reason,
            }),
        }
    }

    /// Change the render state of the mesh called `name`.
    /// Returns false when there is no such mesh.
    pub fn set_mesh_render_state(&mut self, name: &str, state: RenderState) -> bool {
        match self.meshes.iter_mut().find(|mesh| mesh.name() == name) {
            Some(mesh) => {
                mesh.set_render_state(state);
                true
            }
            None => false,
        }
    }

    /// Mesh called `name`
    pub fn mesh_by_name(&self, name: &str) -> Option<&Mesh> {
        self.meshes.iter().find(|mesh| mesh.name() == name)
    }

    /// Texture path for every mesh, in mesh order
    pub fn resolve_textures(&self, resolver: &dyn TextureResolver) -> Vec<Result<PathBuf>> {
        self.meshes
            .iter()
            .map(|mesh| resolver.resolve_texture(mesh.shader()))
            .collect()
    }

    /// File stem, or the parse context for models not loaded from disk
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All meshes in file order
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Number of joints in the bind pose
    pub fn joint_count(&self) -> usize {
        self.base_skeleton.joint_count()
    }

    /// Bind pose skeleton
    pub fn base_skeleton(&self) -> &Skeleton {
        &self.base_skeleton
    }

    /// Union of all mesh boxes in the bind pose
    pub fn bind_pose_bounding_box(&self) -> &BoundingBox {
        &self.bind_pose_box
    }
}
