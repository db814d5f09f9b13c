//! MD5 mesh topology and per-pose vertex arrays
//!
//! A [`Mesh`] keeps the static data read from a `mesh { ... }` block
//! (vertices, triangles, weights) and produces flat vertex arrays for any
//! pose of the owning model's skeleton.

use std::ops::Range;

use glam::{Vec2, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::common::{BoundingBox, initial_capacity};
use crate::error::{Md5Error, Result};
use crate::skeleton::Skeleton;
use crate::skinning::{SkinningOptions, bias_sum, skin_position, skin_vertex};
use crate::tokenizer::TokenReader;

/// Whether a mesh is skinned and drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RenderState {
    /// Skip the mesh entirely
    Hidden,
    /// Keep vertex arrays up to date but don't draw
    ComputeOnly,
    /// Skin and draw
    #[default]
    Visible,
}

impl RenderState {
    /// Whether vertex arrays should be recomputed for new poses
    pub fn is_skinned(self) -> bool {
        self != Self::Hidden
    }

    /// Whether the renderer should draw the mesh
    pub fn is_drawn(self) -> bool {
        self == Self::Visible
    }
}

/// Mesh vertex: texture coordinates and a range into the weight array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub uv: Vec2,
    pub weight_start: usize,
    pub weight_count: usize,
}

impl Vertex {
    /// Indices of this vertex's weights, `None` when the end overflows
    pub fn weight_range(&self) -> Option<Range<usize>> {
        let end = self.weight_start.checked_add(self.weight_count)?;
        Some(self.weight_start..end)
    }
}

/// Triangle as three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [usize; 3],
}

/// One joint's contribution to one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    /// Joint index in the model skeleton
    pub joint: usize,
    /// Contribution factor; a vertex's biases should sum to 1.0
    pub bias: f32,
    /// Offset in the joint's local space
    pub position: Vec3,
    /// Normal in the joint's local space
    pub normal: Vec3,
    /// Tangent in the joint's local space
    pub tangent: Vec3,
}

/// Flat vertex arrays ready for upload
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshBuffers {
    /// xyz per vertex
    pub positions: Vec<f32>,
    /// xyz per vertex
    pub normals: Vec<f32>,
    /// xyz per vertex
    pub tangents: Vec<f32>,
    /// uv per vertex
    pub tex_coords: Vec<f32>,
    /// Three vertex indices per triangle
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    /// Number of vertices held
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Position of vertex `index`
    pub fn position(&self, index: usize) -> Option<Vec3> {
        read_vec3(&self.positions, index)
    }

    /// Normal of vertex `index`
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        read_vec3(&self.normals, index)
    }

    /// Tangent of vertex `index`
    pub fn tangent(&self, index: usize) -> Option<Vec3> {
        read_vec3(&self.tangents, index)
    }
}

fn read_vec3(data: &[f32], index: usize) -> Option<Vec3> {
    data.get(index * 3..index * 3 + 3).map(Vec3::from_slice)
}

fn write_vec3(data: &mut [f32], index: usize, value: Vec3) {
    if let Some(slot) = data.get_mut(index * 3..index * 3 + 3) {
        value.write_to_slice(slot);
    }
}

/// A single mesh of an MD5 model
#[derive(Debug, Clone)]
pub struct Mesh {
    shader: String,
    name: String,
    render_state: RenderState,
    bounding_box: BoundingBox,
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    weights: Vec<Weight>,
    required_joints: usize,
    buffers: MeshBuffers,
}

impl Mesh {
    /// Read the body of a `mesh { ... }` block, up to and including the
    /// closing brace. `joint_count` is the size of the model skeleton, used
    /// to validate weight joint indices.
    pub fn parse<'a, R: TokenReader<'a>>(reader: &mut R, joint_count: usize) -> Result<Self> {
        let context = format!("{} (mesh)", reader.context());

        let mut shader = String::new();
        let mut declared = [None::<usize>; 3];
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        let mut weights = Vec::new();

        loop {
            let token = reader.expect_token("'}' closing the mesh block")?;
            match token {
                "}" => break,
                "shader" => {
                    shader = reader.expect_token("shader name")?.to_string();
                }
                "numverts" => {
                    let count = reader.parse_value("vertex count")?;
                    vertices.reserve(initial_capacity(count));
                    declared[0] = Some(count);
                }
                "numtris" => {
                    let count = reader.parse_value("triangle count")?;
                    triangles.reserve(initial_capacity(count));
                    declared[1] = Some(count);
                }
                "numweights" => {
                    let count = reader.parse_value("weight count")?;
                    weights.reserve(initial_capacity(count));
                    declared[2] = Some(count);
                }
                "vert" => {
                    check_index(reader, &context, "vert", vertices.len())?;
                    let uv = reader.parse_vec2("texture coordinate")?;
                    let weight_start = reader.parse_value("start weight")?;
                    let weight_count = reader.parse_value("weight count")?;
                    vertices.push(Vertex {
                        uv,
                        weight_start,
                        weight_count,
                    });
                }
                "tri" => {
                    check_index(reader, &context, "tri", triangles.len())?;
                    let indices = [
                        reader.parse_value("vertex index")?,
                        reader.parse_value("vertex index")?,
                        reader.parse_value("vertex index")?,
                    ];
                    triangles.push(Triangle { indices });
                }
                "weight" => {
                    check_index(reader, &context, "weight", weights.len())?;
                    let joint = reader.parse_value("joint index")?;
                    let bias = reader.parse_value("weight bias")?;
                    let position = reader.parse_vec3("weight position")?;
                    weights.push(Weight {
                        joint,
                        bias,
                        position,
                        normal: Vec3::ZERO,
                        tangent: Vec3::ZERO,
                    });
                }
                _ => {}
            }
            reader.rest_of_line();
        }

        let counts = [vertices.len(), triangles.len(), weights.len()];
        for ((label, declared), actual) in ["numverts", "numtris", "numweights"]
            .iter()
            .zip(declared)
            .zip(counts)
        {
            if let Some(declared) = declared
                && declared != actual
            {
                return Err(Md5Error::invalid_data(
                    &context,
                    format!("{label} declares {declared} entries but {actual} were read"),
                ));
            }
        }

        let name = shader
            .rsplit_once('/')
            .map_or(shader.as_str(), |(_, tail)| tail)
            .to_string();

        Self::from_parts(shader, name, vertices, triangles, weights, joint_count)
            .map_err(|err| match err {
                Md5Error::InvalidData { message, .. } => Md5Error::InvalidData { context, message },
                other => other,
            })
    }

    /// Build a mesh from already-decoded topology, validating every index
    pub fn from_parts(
        shader: String,
        name: String,
        vertices: Vec<Vertex>,
        triangles: Vec<Triangle>,
        weights: Vec<Weight>,
        joint_count: usize,
    ) -> Result<Self> {
        let context = "mesh";

        for (index, vertex) in vertices.iter().enumerate() {
            let in_range = vertex
                .weight_range()
                .is_some_and(|range| range.end <= weights.len());
            if !in_range {
                return Err(Md5Error::invalid_data(
                    context,
                    format!(
                        "vertex {index} uses {} weights from {} but only {} exist",
                        vertex.weight_count,
                        vertex.weight_start,
                        weights.len()
                    ),
                ));
            }
        }

        for (index, triangle) in triangles.iter().enumerate() {
            if let Some(bad) = triangle.indices.iter().find(|&&i| i >= vertices.len()) {
                return Err(Md5Error::invalid_data(
                    context,
                    format!("triangle {index} references missing vertex {bad}"),
                ));
            }
        }

        for (index, weight) in weights.iter().enumerate() {
            if weight.joint >= joint_count {
                return Err(Md5Error::invalid_data(
                    context,
                    format!(
                        "weight {index} references joint {} but the skeleton has {joint_count}",
                        weight.joint
                    ),
                ));
            }
        }

        let required_joints = weights.iter().map(|w| w.joint + 1).max().unwrap_or(0);

        let mut mesh = Self {
            shader,
            name,
            render_state: RenderState::Visible,
            bounding_box: BoundingBox::EMPTY,
            vertices,
            triangles,
            weights,
            required_joints,
            buffers: MeshBuffers::default(),
        };
        mesh.buffers = mesh.allocate_buffers();
        Ok(mesh)
    }

    /// Check bias sums, optionally renormalizing them, and report
    /// degenerate vertices
    pub fn check_weights(&mut self, options: &SkinningOptions) {
        let mut unweighted = 0usize;
        let mut off_unit = 0usize;

        for vertex in &self.vertices {
            let range = vertex.weight_range().unwrap_or_default();
            if range.is_empty() {
                unweighted += 1;
                continue;
            }

            let sum = bias_sum(&self.weights[range.clone()]);
            if (sum - 1.0).abs() <= options.weight_sum_tolerance {
                continue;
            }
            off_unit += 1;

            if options.normalize_weights && sum > 0.0 {
                for weight in &mut self.weights[range] {
                    weight.bias /= sum;
                }
            }
        }

        if unweighted > 0 {
            log::warn!(
                "Mesh '{}': {} vertices have no weights and will collapse to the origin",
                self.name,
                unweighted
            );
        }
        if off_unit > 0 {
            if options.normalize_weights {
                log::warn!(
                    "Mesh '{}': renormalized weights of {} vertices whose biases did not sum to 1",
                    self.name,
                    off_unit
                );
            } else {
                log::warn!(
                    "Mesh '{}': {} vertices have biases not summing to 1; they will be scaled",
                    self.name,
                    off_unit
                );
            }
        }
    }

    /// Recompute bind-pose vertex normals from the triangles and store them
    /// in each weight's joint-local space.
    ///
    /// `skeleton` must be the bind pose the weights were authored against.
    pub fn compute_weight_normals(&mut self, skeleton: &Skeleton) -> Result<()> {
        self.check_pose(skeleton)?;
        let joints = skeleton.joints();

        let positions = self.bind_positions(skeleton);
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        // MD5 triangles wind clockwise, so the outward normal is (v2-v0)x(v1-v0)
        for triangle in &self.triangles {
            let [a, b, c] = triangle.indices;
            let face = (positions[c] - positions[a]).cross(positions[b] - positions[a]);
            for index in triangle.indices {
                normals[index] += face;
            }
        }

        for weight in &mut self.weights {
            weight.normal = Vec3::ZERO;
        }

        for (vertex, normal) in self.vertices.iter().zip(&normals) {
            let normal = normal.normalize_or_zero();
            let range = vertex.weight_range().unwrap_or_default();
            for weight in &mut self.weights[range] {
                let inverse = joints[weight.joint].orientation.conjugate();
                weight.normal += inverse * normal;
            }
        }

        for weight in &mut self.weights {
            weight.normal = weight.normal.normalize_or_zero();
        }

        Ok(())
    }

    /// Derive bind-pose tangents from texture coordinates and store them in
    /// each weight's joint-local space.
    ///
    /// Uses the weight normals, so [`Self::compute_weight_normals`] must run
    /// first.
    pub fn compute_weight_tangents(&mut self, skeleton: &Skeleton) -> Result<()> {
        self.check_pose(skeleton)?;
        let joints = skeleton.joints();

        let vertex_count = self.vertices.len();
        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(vertex_count);
        for vertex in &self.vertices {
            let skinned = skin_vertex(self.vertex_weights(vertex), joints);
            positions.push(skinned.position);
            normals.push(skinned.normal);
        }

        let mut s_tangents = vec![Vec3::ZERO; vertex_count];
        let mut t_tangents = vec![Vec3::ZERO; vertex_count];
        let mut degenerate = 0usize;

        for triangle in &self.triangles {
            let [i0, i1, i2] = triangle.indices;
            let (v0, v1, v2) = (positions[i0], positions[i1], positions[i2]);
            let (w0, w1, w2) = (
                self.vertices[i0].uv,
                self.vertices[i1].uv,
                self.vertices[i2].uv,
            );

            let e1 = v1 - v0;
            let e2 = v2 - v0;
            let (s1, s2) = (w1.x - w0.x, w2.x - w0.x);
            let (t1, t2) = (w1.y - w0.y, w2.y - w0.y);

            let mut r = s1 * t2 - s2 * t1;
            if r == 0.0 {
                degenerate += 1;
                r = 1.0;
            }
            let inv_r = 1.0 / r;

            let s_dir = (e1 * t2 - e2 * t1) * inv_r;
            let t_dir = (e2 * s1 - e1 * s2) * inv_r;

            for index in triangle.indices {
                s_tangents[index] += s_dir;
                t_tangents[index] += t_dir;
            }
        }

        if degenerate > 0 {
            log::debug!(
                "Mesh '{}': {} triangles have a zero UV determinant; tangents approximated",
                self.name,
                degenerate
            );
        }

        for weight in &mut self.weights {
            weight.tangent = Vec3::ZERO;
        }

        for (index, vertex) in self.vertices.iter().enumerate() {
            let n = normals[index];
            let t = s_tangents[index];

            // Gram-Schmidt orthogonalize, then fix handedness
            let mut tangent = (t - n * n.dot(t)).normalize_or_zero();
            if n.cross(t).dot(t_tangents[index]) < 0.0 {
                tangent = -tangent;
            }

            let range = vertex.weight_range().unwrap_or_default();
            for weight in &mut self.weights[range] {
                let inverse = joints[weight.joint].orientation.conjugate();
                weight.tangent += inverse * tangent;
            }
        }

        for weight in &mut self.weights {
            weight.tangent = weight.tangent.normalize_or_zero();
        }

        Ok(())
    }

    /// Skin every vertex for `skeleton` and record the enclosing box
    pub fn compute_bounding_box(&mut self, skeleton: &Skeleton) -> Result<BoundingBox> {
        self.check_pose(skeleton)?;
        self.bounding_box = BoundingBox::from_points(self.bind_positions(skeleton));
        Ok(self.bounding_box)
    }

    /// Allocate the mesh's own vertex arrays and fill them for `skeleton`
    pub fn setup_vertex_arrays(&mut self, skeleton: &Skeleton) -> Result<()> {
        self.buffers = self.allocate_buffers();
        self.update_vertex_arrays(skeleton)
    }

    /// Re-skin the mesh's own vertex arrays for `skeleton`
    pub fn update_vertex_arrays(&mut self, skeleton: &Skeleton) -> Result<()> {
        let mut buffers = std::mem::take(&mut self.buffers);
        let result = self.skin_into(skeleton, &mut buffers);
        self.buffers = buffers;
        result
    }

    /// Skin the mesh for `skeleton` into caller-owned arrays, reallocating
    /// them if they were sized for another mesh
    pub fn skin_into(&self, skeleton: &Skeleton, buffers: &mut MeshBuffers) -> Result<()> {
        self.check_pose(skeleton)?;
        let joints = skeleton.joints();

        let vertex_count = self.vertices.len();
        if buffers.positions.len() != vertex_count * 3
            || buffers.normals.len() != vertex_count * 3
            || buffers.tangents.len() != vertex_count * 3
            || buffers.indices.len() != self.triangles.len() * 3
        {
            *buffers = self.allocate_buffers();
        }

        for (index, vertex) in self.vertices.iter().enumerate() {
            let skinned = skin_vertex(self.vertex_weights(vertex), joints);
            write_vec3(&mut buffers.positions, index, skinned.position);
            write_vec3(&mut buffers.normals, index, skinned.normal);
            write_vec3(&mut buffers.tangents, index, skinned.tangent);
        }

        Ok(())
    }

    /// Zeroed arrays sized for this mesh, with the static texture
    /// coordinates and triangle indices filled in
    pub fn allocate_buffers(&self) -> MeshBuffers {
        let vertex_count = self.vertices.len();
        MeshBuffers {
            positions: vec![0.0; vertex_count * 3],
            normals: vec![0.0; vertex_count * 3],
            tangents: vec![0.0; vertex_count * 3],
            tex_coords: self
                .vertices
                .iter()
                .flat_map(|vertex| [vertex.uv.x, vertex.uv.y])
                .collect(),
            indices: self
                .triangles
                .iter()
                .flat_map(|triangle| triangle.indices.map(|i| i as u32))
                .collect(),
        }
    }

    /// Shader name as written in the file
    pub fn shader(&self) -> &str {
        &self.shader
    }

    /// Mesh name: the last path component of the shader
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current render state
    pub fn render_state(&self) -> RenderState {
        self.render_state
    }

    /// Change the render state
    pub fn set_render_state(&mut self, state: RenderState) {
        self.render_state = state;
    }

    /// Box computed by the last [`Self::compute_bounding_box`]
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Vertices
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangles
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Weights
    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    /// Arrays from the last setup/update call
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Weights of one vertex
    pub fn vertex_weights(&self, vertex: &Vertex) -> &[Weight] {
        vertex
            .weight_range()
            .and_then(|range| self.weights.get(range))
            .unwrap_or_default()
    }

    /// Minimum number of joints a pose needs to skin this mesh
    pub fn required_joints(&self) -> usize {
        self.required_joints
    }

    fn bind_positions(&self, skeleton: &Skeleton) -> Vec<Vec3> {
        self.vertices
            .iter()
            .map(|vertex| skin_position(self.vertex_weights(vertex), skeleton.joints()))
            .collect()
    }

    fn check_pose(&self, skeleton: &Skeleton) -> Result<()> {
        if skeleton.joint_count() < self.required_joints {
            return Err(Md5Error::JointCountMismatch {
                required: self.required_joints,
                found: skeleton.joint_count(),
            });
        }
        Ok(())
    }
}

fn check_index<'a, R: TokenReader<'a>>(
    reader: &mut R,
    context: &str,
    kind: &str,
    expected: usize,
) -> Result<()> {
    let index: usize = reader.parse_value(&format!("{kind} index"))?;
    if index != expected {
        return Err(Md5Error::invalid_data(
            context,
            format!(
                "line {}: {kind} {index} out of order, expected {expected}",
                reader.line()
            ),
        ));
    }
    Ok(())
}
