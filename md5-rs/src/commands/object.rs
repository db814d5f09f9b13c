//! Animated object command implementations

use anyhow::{Context, Result, anyhow};
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;

use md5_model::{ClipKind, Md5Model, Md5Object, TimelinePhase};

use crate::utils::{format_percentage, format_seconds, format_vec3};

#[derive(Subcommand)]
pub enum ObjectCommands {
    /// Schedule animations back to back and sample the object at a time
    Sample {
        /// Path to the .md5mesh file
        mesh: PathBuf,

        /// Paths to the .md5anim files, played in the given order
        #[arg(required = true)]
        anims: Vec<PathBuf>,

        /// Timeline time to sample, in seconds
        #[arg(short, long, default_value = "0")]
        time: f32,

        /// Seconds of blending between consecutive animations
        #[arg(short, long, default_value = "0")]
        gap: f32,

        /// Transition clip played between two animations, as FROM:TO:PATH
        #[arg(long, value_name = "FROM:TO:PATH")]
        transition: Vec<String>,

        /// Print every joint of the sampled pose
        #[arg(short, long)]
        detailed: bool,

        /// Print the result as JSON
        #[cfg(feature = "serde")]
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: ObjectCommands) -> Result<()> {
    match cmd {
        ObjectCommands::Sample {
            mesh,
            anims,
            time,
            gap,
            transition,
            detailed,
            #[cfg(feature = "serde")]
            json,
        } => {
            let request = SampleRequest {
                mesh,
                anims,
                time,
                gap,
                transitions: transition,
                detailed,
            };
            #[cfg(feature = "serde")]
            if json {
                return handle_sample_json(&request);
            }
            handle_sample(&request)
        }
    }
}

struct SampleRequest {
    mesh: PathBuf,
    anims: Vec<PathBuf>,
    time: f32,
    gap: f32,
    transitions: Vec<String>,
    detailed: bool,
}

/// Load the model and clips, fill the timeline and advance to the
/// requested time
fn build_object(request: &SampleRequest) -> Result<(Md5Object, TimelinePhase)> {
    let model = Md5Model::load(&request.mesh)
        .with_context(|| format!("Failed to load MD5 mesh from {}", request.mesh.display()))?;
    let mut object = Md5Object::with_model(Arc::new(model));

    let mut start = 0.0;
    for path in &request.anims {
        let clip = object
            .add_animation_file(path, ClipKind::Playable)
            .with_context(|| format!("Failed to add animation {}", path.display()))?;
        object.drop_anim(start, clip.name())?;
        start += clip.duration() + request.gap;
    }

    for spec in &request.transitions {
        let (from, to, path) = parse_transition(spec)?;
        let clip = object
            .add_animation_file(&path, ClipKind::Transition)
            .with_context(|| format!("Failed to add transition {}", path.display()))?;
        object
            .register_transition(from, to, clip.name())
            .with_context(|| format!("Invalid transition '{spec}'"))?;
    }

    let phase = object
        .animate_final(request.time)
        .with_context(|| format!("Failed to animate at {}", format_seconds(request.time)))?;
    Ok((object, phase))
}

fn handle_sample(request: &SampleRequest) -> Result<()> {
    let (mut object, phase) = build_object(request)?;
    let bounds = object.compute_bounding_box()?;

    println!("=== Object Sample ===");
    println!("Time:       {}", format_seconds(request.time));
    println!("Timeline:   {}", format_seconds(object.total_time()));
    match phase {
        TimelinePhase::FinishingCurrent { index, fraction } => {
            let name = object.timeline_anim(index).map_or("?", |clip| clip.name());
            let cursor = object.cursor();
            println!("Playing:    {name} ({})", format_percentage(fraction));
            println!(
                "Frames:     {} -> {} at {}",
                cursor.current,
                cursor.next,
                format_percentage(cursor.remainder)
            );
        }
        TimelinePhase::EnteringNext { index, fraction } => {
            let from = object.timeline_anim(index).map_or("?", |clip| clip.name());
            let to = object.timeline_anim(index + 1).map_or("?", |clip| clip.name());
            let via = object
                .get_transition(index)
                .map_or_else(String::new, |clip| format!(" via {}", clip.name()));
            println!(
                "Blending:   {from} -> {to}{via} ({})",
                format_percentage(fraction)
            );
        }
        TimelinePhase::NoActiveClip => println!("Playing:    nothing (bind pose)"),
    }
    println!("Center:     {}", format_vec3(bounds.center));
    println!("Extent:     {}", format_vec3(bounds.extent));

    if request.detailed {
        println!("\n=== Pose ===");
        for (index, joint) in object.pose().joints().iter().enumerate() {
            println!(
                "{:>3}  {:<24} {}",
                index,
                joint.name(),
                format_vec3(joint.position)
            );
        }
    }

    Ok(())
}

#[cfg(feature = "serde")]
fn handle_sample_json(request: &SampleRequest) -> Result<()> {
    let (mut object, phase) = build_object(request)?;
    let bounds = object.compute_bounding_box()?;

    let mut report = serde_json::json!({
        "time": request.time,
        "total_time": object.total_time(),
        "phase": phase,
        "center": bounds.center,
        "extent": bounds.extent,
    });
    if request.detailed {
        report["pose"] = serde_json::to_value(object.pose())?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Split `FROM:TO:PATH`; the path may itself contain colons
fn parse_transition(spec: &str) -> Result<(&str, &str, PathBuf)> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(from), Some(to), Some(path)) if !from.is_empty() && !to.is_empty() && !path.is_empty() => {
            Ok((from, to, PathBuf::from(path)))
        }
        _ => Err(anyhow!("Transition '{spec}' is not in FROM:TO:PATH form")),
    }
}
