//! MD5 mesh file command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use md5_model::{DirectoryResolver, Md5Model, SkinningOptions};

use crate::utils::{format_bounds, format_vec3};

#[derive(Subcommand)]
pub enum MeshCommands {
    /// Display information about an .md5mesh file
    Info {
        /// Path to the .md5mesh file
        file: PathBuf,

        /// List joints and per-mesh weight details
        #[arg(short, long)]
        detailed: bool,

        /// Resolve mesh shaders to textures below this directory
        #[arg(long, value_name = "DIR")]
        textures: Option<PathBuf>,

        /// Renormalize vertex weights whose biases don't sum to one
        #[arg(long)]
        normalize_weights: bool,
    },
}

pub fn execute(cmd: MeshCommands) -> Result<()> {
    match cmd {
        MeshCommands::Info {
            file,
            detailed,
            textures,
            normalize_weights,
        } => handle_info(file, detailed, textures, normalize_weights),
    }
}

fn handle_info(
    path: PathBuf,
    detailed: bool,
    textures: Option<PathBuf>,
    normalize_weights: bool,
) -> Result<()> {
    let options = SkinningOptions {
        normalize_weights,
        ..SkinningOptions::default()
    };
    let model = Md5Model::load_with_options(&path, &options)
        .with_context(|| format!("Failed to load MD5 mesh from {}", path.display()))?;

    println!("=== MD5 Mesh Information ===");
    println!("Name:     {}", model.name());
    println!("Joints:   {}", model.joint_count());
    println!("Meshes:   {}", model.meshes().len());
    println!("Bounds:   {}", format_bounds(model.bind_pose_bounding_box()));

    if detailed {
        println!("\n=== Joints ===");
        for (index, joint) in model.base_skeleton().joints().iter().enumerate() {
            println!(
                "{:>3}  {:<24} parent {:>3}  {}",
                index,
                joint.name(),
                joint.parent_index(),
                format_vec3(joint.position)
            );
        }
    }

    println!("\n=== Meshes ===");
    for mesh in model.meshes() {
        println!(
            "{:<16} {:>6} verts {:>6} tris {:>6} weights  shader \"{}\"",
            mesh.name(),
            mesh.vertices().len(),
            mesh.triangles().len(),
            mesh.weights().len(),
            mesh.shader()
        );
        if detailed {
            let max_influences = mesh
                .vertices()
                .iter()
                .map(|vertex| vertex.weight_count)
                .max()
                .unwrap_or(0);
            println!("    joints used:    {}", mesh.required_joints());
            println!("    max influences: {max_influences}");
            println!("    bounds:         {}", format_bounds(mesh.bounding_box()));
        }
    }

    if let Some(dir) = textures {
        let resolver = DirectoryResolver::new(&dir);
        println!("\n=== Textures ===");
        for (mesh, texture) in model.meshes().iter().zip(model.resolve_textures(&resolver)) {
            match texture {
                Ok(file) => println!("{:<16} {}", mesh.name(), file.display()),
                Err(err) => {
                    log::warn!("{err}");
                    println!("{:<16} (missing)", mesh.name());
                }
            }
        }
    }

    Ok(())
}
