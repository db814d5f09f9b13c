//! Integration tests for bind-pose and posed skinning

use glam::Vec3;
use md5_model::{Md5Error, Md5Model, MeshBuffers, Skeleton, SkinningOptions};
use pretty_assertions::assert_eq;

use crate::common::GUARD_MESH;

fn positions(buffers: &MeshBuffers) -> Vec<Vec3> {
    (0..buffers.vertex_count())
        .filter_map(|index| buffers.position(index))
        .collect()
}

/// Vertex normals derived from skinned positions, the way the loader
/// derives them for the bind pose
fn face_normals(buffers: &MeshBuffers) -> Vec<Vec3> {
    let points = positions(buffers);
    let mut normals = vec![Vec3::ZERO; points.len()];
    for triangle in buffers.indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let face = (points[c] - points[a]).cross(points[b] - points[a]);
        for index in [a, b, c] {
            normals[index] += face;
        }
    }
    normals.into_iter().map(Vec3::normalize_or_zero).collect()
}

#[test]
fn test_identity_skinning_at_bind_pose() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let body = model.mesh_by_name("body").unwrap();

    assert_eq!(positions(body.buffers()), vec![
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 3.0),
        Vec3::new(-1.0, 0.0, 3.0),
    ]);
    assert_eq!(body.buffers().indices, vec![0, 2, 1, 0, 3, 2]);
}

#[test]
fn test_rotated_joint_skinning() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let hand = positions(model.mesh_by_name("hand").unwrap().buffers());

    let expected = [
        Vec3::new(1.0, 0.0, 2.0),
        Vec3::new(1.0, -0.5, 2.0),
        Vec3::new(1.0, 0.0, 2.5),
    ];
    for (actual, expected) in hand.iter().zip(expected) {
        assert!(actual.abs_diff_eq(expected, 1e-5), "{actual} != {expected}");
    }
}

#[test]
fn test_weight_normals_round_trip() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();

    for mesh in model.meshes() {
        let buffers = mesh.buffers();
        let expected = face_normals(buffers);
        for (index, expected) in expected.iter().enumerate() {
            let skinned = buffers.normal(index).unwrap().normalize();
            assert!(
                skinned.abs_diff_eq(*expected, 1e-5),
                "{} vertex {index}: {skinned} != {expected}",
                mesh.name()
            );
        }
    }
}

#[test]
fn test_tangents_are_orthogonal_unit_vectors() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();

    for mesh in model.meshes() {
        let buffers = mesh.buffers();
        for index in 0..buffers.vertex_count() {
            let normal = buffers.normal(index).unwrap();
            let tangent = buffers.tangent(index).unwrap();
            assert!((tangent.length() - 1.0).abs() < 1e-4, "{}", mesh.name());
            assert!(normal.dot(tangent).abs() < 1e-4, "{}", mesh.name());
        }
    }
}

#[test]
fn test_tangents_can_be_skipped() {
    let options = SkinningOptions {
        compute_tangents: false,
        ..SkinningOptions::default()
    };
    let model = Md5Model::parse_with_options(GUARD_MESH, "guard", &options).unwrap();
    let body = model.mesh_by_name("body").unwrap();
    assert_eq!(body.buffers().tangent(0), Some(Vec3::ZERO));
}

#[test]
fn test_bad_bias_sum_scales_vertex() {
    let _ = env_logger::builder().is_test(true).try_init();
    let text = GUARD_MESH.replace("weight 2 2 0.5", "weight 2 2 0.25");

    let model = Md5Model::parse(&text, "guard").unwrap();
    let scaled = model.mesh_by_name("hand").unwrap().buffers().position(2).unwrap();
    assert!(scaled.abs_diff_eq(Vec3::new(0.75, 0.0, 1.875), 1e-5), "{scaled}");

    let options = SkinningOptions {
        normalize_weights: true,
        ..SkinningOptions::default()
    };
    let model = Md5Model::parse_with_options(&text, "guard", &options).unwrap();
    let fixed = model.mesh_by_name("hand").unwrap().buffers().position(2).unwrap();
    assert!(fixed.abs_diff_eq(Vec3::new(1.0, 0.0, 2.5), 1e-5), "{fixed}");
}

#[test]
fn test_unweighted_vertex_collapses_to_origin() {
    let _ = env_logger::builder().is_test(true).try_init();
    let text = GUARD_MESH.replace("vert 3 ( 0 1 ) 3 1", "vert 3 ( 0 1 ) 3 0");
    let model = Md5Model::parse(&text, "guard").unwrap();
    let body = model.mesh_by_name("body").unwrap();
    assert_eq!(body.buffers().position(3), Some(Vec3::ZERO));
}

#[test]
fn test_posed_skinning() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let mut pose = model.base_skeleton().clone();
    pose.joint_mut(1).unwrap().position.z += 1.0;

    let mut buffers = model.bind_pose_buffers();
    model.prepare(&pose, &mut buffers).unwrap();

    assert_eq!(buffers[0].position(2), Some(Vec3::new(1.0, 0.0, 4.0)));
    assert_eq!(buffers[0].position(0), Some(Vec3::new(-1.0, 0.0, 0.0)));
    // bind pose arrays owned by the model are untouched
    assert_eq!(
        model.meshes()[0].buffers().position(2),
        Some(Vec3::new(1.0, 0.0, 3.0))
    );
}

#[test]
fn test_prepare_rejects_short_pose() {
    let model = Md5Model::parse(GUARD_MESH, "guard").unwrap();
    let mut buffers = model.bind_pose_buffers();
    let err = model.prepare(&Skeleton::default(), &mut buffers).unwrap_err();
    assert!(matches!(err, Md5Error::JointCountMismatch { found: 0, .. }));
}
