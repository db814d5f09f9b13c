//! Integration tests for loading models and animations from disk

use std::fs;

use glam::Vec3;
use md5_model::common::same_rotation;
use md5_model::{DirectoryResolver, Md5Animation, Md5Error, Md5Model, TextureResolver};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use test_case::test_case;

use crate::common::{GUARD_MESH, arm_clip, guard_on_disk};

#[test]
fn test_load_model_from_disk() {
    let (_dir, mesh_path) = guard_on_disk(&[]);
    let model = Md5Model::load(&mesh_path).unwrap();

    assert_eq!(model.name(), "guard");
    assert_eq!(model.joint_count(), 3);

    let names: Vec<_> = model.meshes().iter().map(|mesh| mesh.name()).collect();
    assert_eq!(names, ["body", "hand"]);
    assert_eq!(model.mesh_by_name("hand").unwrap().shader(), "models/guard/hand");

    let bounds = model.bind_pose_bounding_box();
    assert!(bounds.min.abs_diff_eq(Vec3::new(-1.0, -0.5, 0.0), 1e-5));
    assert!(bounds.max.abs_diff_eq(Vec3::new(1.0, 0.0, 3.0), 1e-5));
}

#[test]
fn test_load_animation_from_disk() {
    let (dir, mesh_path) = guard_on_disk(&[("wave", &[1.0, 2.0, 3.0])]);
    let model = Md5Model::load(&mesh_path).unwrap();
    let anim = Md5Animation::load(dir.path().join("wave.md5anim")).unwrap();

    assert_eq!(anim.name(), "wave");
    assert_eq!(anim.frame_count(), 3);
    assert_eq!(anim.joint_count(), 3);
    assert!((anim.duration() - 1.5).abs() < 1e-6);
    assert!(model.validity_check(&anim));
}

#[test]
fn test_frames_are_model_space() {
    let anim = Md5Animation::parse(&arm_clip(&[1.0, 2.0, 3.0], 24.0), "wave").unwrap();
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();

    let arm = anim.frame(2).unwrap().joint(2).unwrap();
    assert_eq!(arm.position, Vec3::new(3.0, 0.0, 2.0));

    let bind_arm = model.base_skeleton().joint(2).unwrap();
    assert!(same_rotation(arm.orientation, bind_arm.orientation, 1e-6));
}

#[test_case("\"origin\"\t-1", "\"root\"\t-1" ; "renamed root")]
#[test_case("\"arm\"\t1 1 0", "\"arm\"\t0 1 0" ; "reparented arm")]
#[test_case("\"spine\"\t0", "\"chest\"\t0" ; "renamed spine")]
fn test_validity_check_rejects(from: &str, to: &str) {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let text = arm_clip(&[1.0, 2.0], 24.0).replace(from, to);
    let anim = Md5Animation::parse(&text, "broken").unwrap();

    assert!(!model.validity_check(&anim));
    let err = model.validate_animation(&anim).unwrap_err();
    assert!(err.is_validation_error());
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_missing_files_name_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.md5anim");

    match Md5Animation::load(&path) {
        Err(Md5Error::Open { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(Md5Model::load(dir.path().join("absent.md5mesh")).unwrap_err().is_load_error());
}

#[test]
fn test_version_mismatch_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.md5mesh");
    fs::write(&path, GUARD_MESH.replace("MD5Version 10", "MD5Version 4")).unwrap();

    let err = Md5Model::load(&path).unwrap_err();
    assert!(matches!(err, Md5Error::UnsupportedVersion { found: 4, .. }));
    assert!(err.to_string().contains("old.md5mesh"));
}

#[test]
fn test_corrupt_weight_reference() {
    let text = GUARD_MESH.replace("weight 3 1 0.5", "weight 3 7 0.5");
    let err = Md5Model::parse(&text, "guard").unwrap_err();
    assert!(err.is_load_error());
    assert!(err.to_string().contains("joint 7"));
}

#[test_case("numJoints 3" ; "joints")]
#[test_case("numMeshes 2" ; "meshes")]
#[test_case("numverts 4" ; "vertices")]
#[test_case("numtris 2" ; "triangles")]
fn test_huge_declared_count_is_a_load_error(line: &str) {
    let key = line.split(' ').next().unwrap_or_default();
    let text = GUARD_MESH.replacen(line, &format!("{key} 18446744073709551615"), 1);
    let err = Md5Model::parse(&text, "guard").unwrap_err();
    assert!(err.is_load_error(), "{err}");
}

#[test]
fn test_overflowing_weight_start_is_a_load_error() {
    let text = GUARD_MESH.replacen("vert 3 ( 0 1 ) 3 1", "vert 3 ( 0 1 ) 18446744073709551615 1", 1);
    let err = Md5Model::parse(&text, "guard").unwrap_err();
    assert!(err.is_load_error());
    assert!(err.to_string().contains("vertex 3"), "{err}");
}

#[test]
fn test_texture_resolution() {
    let dir = TempDir::new().unwrap();
    let textures = dir.path().join("models/guard");
    fs::create_dir_all(&textures).unwrap();
    fs::write(textures.join("body.tga"), b"TGA").unwrap();

    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let resolver = DirectoryResolver::new(dir.path());
    let resolved = model.resolve_textures(&resolver);

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].as_ref().unwrap(), &textures.join("body.tga"));
    assert!(matches!(
        &resolved[1],
        Err(Md5Error::TextureNotFound { shader }) if shader == "models/guard/hand"
    ));
    assert_eq!(resolver.load_texture("models/guard/body").unwrap(), b"TGA");
}

#[cfg(feature = "serde-support")]
#[test]
fn test_options_and_phases_serialize() {
    use md5_model::{SkinningOptions, TimelinePhase};

    let options = SkinningOptions {
        normalize_weights: true,
        ..SkinningOptions::default()
    };
    let json = serde_json::to_string(&options).unwrap();
    let back: SkinningOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);

    let phase = TimelinePhase::EnteringNext {
        index: 2,
        fraction: 0.25,
    };
    let json = serde_json::to_string(&phase).unwrap();
    assert_eq!(serde_json::from_str::<TimelinePhase>(&json).unwrap(), phase);
}
