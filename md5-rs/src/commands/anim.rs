//! MD5 animation file command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::PathBuf;

use md5_model::{JointChannels, Md5Animation, Md5Model};

use crate::utils::{format_bounds, format_seconds, format_vec3};

#[derive(Subcommand)]
pub enum AnimCommands {
    /// Display information about an .md5anim file
    Info {
        /// Path to the .md5anim file
        file: PathBuf,

        /// List the hierarchy and per-frame bounds
        #[arg(short, long)]
        detailed: bool,
    },

    /// Check that animations can drive a mesh's skeleton
    Check {
        /// Path to the .md5mesh file
        mesh: PathBuf,

        /// Paths to the .md5anim files
        #[arg(required = true)]
        anims: Vec<PathBuf>,
    },
}

pub fn execute(cmd: AnimCommands) -> Result<()> {
    match cmd {
        AnimCommands::Info { file, detailed } => handle_info(file, detailed),
        AnimCommands::Check { mesh, anims } => handle_check(mesh, anims),
    }
}

fn handle_info(path: PathBuf, detailed: bool) -> Result<()> {
    let anim = Md5Animation::load(&path)
        .with_context(|| format!("Failed to load MD5 animation from {}", path.display()))?;

    println!("=== MD5 Animation Information ===");
    println!("Name:       {}", anim.name());
    println!("Joints:     {}", anim.joint_count());
    println!("Frames:     {}", anim.frame_count());
    println!("Frame rate: {}", anim.frame_rate());
    println!("Duration:   {}", format_seconds(anim.duration()));
    println!("Components: {}", anim.animated_components());

    if detailed {
        println!("\n=== Hierarchy ===");
        for (index, info) in anim.hierarchy().iter().enumerate() {
            let parent = info.parent.map_or_else(|| "-1".to_string(), |p| p.to_string());
            println!(
                "{:>3}  {:<24} parent {:>3}  start {:>4}  {}",
                index,
                info.name,
                parent,
                info.start_index,
                channel_names(info.channels)
            );
        }

        println!("\n=== Frames ===");
        for index in 0..anim.frame_count() {
            let root = anim
                .frame(index)
                .and_then(|frame| frame.joint(0))
                .map_or_else(String::new, |joint| format_vec3(joint.position));
            let bounds = anim
                .frame_bounds(index)
                .map_or_else(String::new, format_bounds);
            println!("{index:>4}  root {root}  bounds {bounds}");
        }
    }

    Ok(())
}

fn handle_check(mesh: PathBuf, anims: Vec<PathBuf>) -> Result<()> {
    let model = Md5Model::load(&mesh)
        .with_context(|| format!("Failed to load MD5 mesh from {}", mesh.display()))?;

    let mut failed = 0usize;
    for path in &anims {
        let anim = Md5Animation::load(path)
            .with_context(|| format!("Failed to load MD5 animation from {}", path.display()))?;

        match model.validate_animation(&anim) {
            Ok(()) => println!("OK    {}", path.display()),
            Err(err) => {
                failed += 1;
                println!("FAIL  {}: {err}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!(
            "{failed} of {} animations do not match {}",
            anims.len(),
            model.name()
        );
    }
    Ok(())
}

/// Channel letters in storage order, `-` when nothing is animated
fn channel_names(channels: JointChannels) -> String {
    if channels.is_empty() {
        return "-".to_string();
    }
    channels
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
