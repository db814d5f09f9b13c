//! Integration tests for interpolation, timelines and animated objects

use std::sync::Arc;

use glam::{Mat4, Vec3};
use md5_model::animation::PlaybackState;
use md5_model::{ClipKind, Md5Animation, Md5Model, Md5Object, RenderState, Skeleton, TimelinePhase};
use pretty_assertions::assert_eq;
use test_case::test_case;

use crate::common::{GUARD_MESH, arm_clip, guard_on_disk};

const LIFT: &str = r#"MD5Version 10
commandline ""

numFrames 2
numJoints 2
frameRate 24
numAnimatedComponents 1

hierarchy {
	"root"	-1 0 0	//
	"child"	0 2 0	// root ( Ty )
}

bounds {
	( 0 0 0 ) ( 1 1 1 )
	( 0 0 0 ) ( 1 3 1 )
}

baseframe {
	( 0 0 0 ) ( 0 0 0 )
	( 0 0 0 ) ( 0 0 0 )
}

frame 0 {
	1
}

frame 1 {
	3
}
"#;

fn guard() -> Arc<Md5Model> {
    Arc::new(Md5Model::parse(GUARD_MESH, "guard").unwrap())
}

fn guard_with(clips: &[(&str, &[f32])]) -> Md5Object {
    let mut object = Md5Object::with_model(guard());
    for (name, arm_x) in clips {
        let clip = Md5Animation::parse(&arm_clip(arm_x, 2.0), name).unwrap();
        object.add_animation(clip, ClipKind::Playable).unwrap();
    }
    object
}

fn hand_origin(object: &Md5Object) -> Vec3 {
    object.buffers()[1].position(0).unwrap()
}

#[test]
fn test_interpolate_midpoint() {
    let anim = Md5Animation::parse(LIFT, "lift").unwrap();
    let mut pose = anim.frame(0).unwrap().clone();

    anim.interpolate_frames(0, 1, 0.5, &mut pose).unwrap();
    assert_eq!(pose.joint(1).unwrap().position, Vec3::new(0.0, 2.0, 0.0));

    let bounds = anim.interpolate_bounds(0, 1, 0.5).unwrap();
    assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 1.0));
}

#[test_case(0.0, 1.0 ; "start")]
#[test_case(1.0, 3.0 ; "end")]
fn test_interpolate_endpoints(t: f32, y: f32) {
    let anim = Md5Animation::parse(LIFT, "lift").unwrap();
    let mut pose = anim.frame(0).unwrap().clone();

    anim.interpolate_frames(0, 1, t, &mut pose).unwrap();
    assert_eq!(pose.joint(1).unwrap().position.y, y);
}

#[test]
fn test_interpolate_same_frame_is_identity() {
    let anim = Md5Animation::parse(LIFT, "lift").unwrap();
    let mut pose = anim.frame(0).unwrap().clone();

    anim.interpolate_frames(1, 1, 0.3, &mut pose).unwrap();
    assert_eq!(&pose, anim.frame(1).unwrap());
}

#[test]
fn test_interpolate_requires_matching_pose() {
    let anim = Md5Animation::parse(LIFT, "lift").unwrap();
    let mut pose = Skeleton::default();
    assert!(anim.interpolate_frames(0, 1, 0.5, &mut pose).is_err());
}

#[test]
fn test_interpolate_past_last_frame() {
    let anim = Md5Animation::parse(LIFT, "lift").unwrap();
    let mut pose = anim.frame(0).unwrap().clone();
    assert!(anim.interpolate_frames(0, 2, 0.5, &mut pose).is_err());
}

#[test]
fn test_blend_between_clips() {
    let wave = Md5Animation::parse(&arm_clip(&[1.0, 2.0, 3.0], 2.0), "wave").unwrap();
    let walk = Md5Animation::parse(&arm_clip(&[5.0, 6.0], 2.0), "walk").unwrap();
    let mut pose = wave.frame(0).unwrap().clone();

    Md5Animation::interpolate_anims(&wave, &walk, 0.5, &mut pose).unwrap();
    assert_eq!(pose.joint(2).unwrap().position, Vec3::new(4.0, 0.0, 2.0));
}

#[test]
fn test_timeline_selects_clips() {
    let mut object = guard_with(&[("a", &[0.0, 1.0, 2.0, 3.0]), ("b", &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])]);
    assert_eq!(object.drop_anim(0.0, "a").unwrap(), 0);
    assert_eq!(object.drop_anim(2.0, "b").unwrap(), 1);
    assert_eq!(object.total_time(), 5.0);

    let phase = object.update_cur_next_anims(1.0);
    assert_eq!(phase, TimelinePhase::FinishingCurrent {
        index: 0,
        fraction: 0.5
    });
    assert_eq!(object.current_anim().unwrap().name(), "a");

    let phase = object.update_cur_next_anims(2.5);
    assert_eq!(phase.index(), Some(1));
    assert!((phase.fraction().unwrap() - 0.5 / 3.0).abs() < 1e-6);
    assert_eq!(object.current_anim().unwrap().name(), "b");

    assert_eq!(object.update_cur_next_anims(6.0), TimelinePhase::NoActiveClip);
    assert!(matches!(object.state(), PlaybackState::Idle));
}

#[test]
fn test_animate_final_skins_current_frame() {
    let mut object = guard_with(&[("wave", &[1.0, 2.0, 3.0])]);
    object.drop_anim(0.0, "wave").unwrap();

    object.animate_final(0.75).unwrap();
    let cursor = object.cursor();
    assert_eq!((cursor.current, cursor.next), (1, 2));
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(2.0, 0.0, 2.0), 1e-5));

    object.animate_final(1.5).unwrap();
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(3.0, 0.0, 2.0), 1e-5));
}

#[test]
fn test_objects_sharing_a_model_are_independent() {
    let model = guard();
    let clip = Md5Animation::parse(&arm_clip(&[1.0, 2.0, 3.0], 2.0), "wave").unwrap();

    let mut dancer = Md5Object::with_model(Arc::clone(&model));
    dancer.add_animation(clip, ClipKind::Playable).unwrap();
    dancer.drop_anim(0.0, "wave").unwrap();
    let mut idler = Md5Object::with_model(Arc::clone(&model));

    dancer.animate_final(0.75).unwrap();
    idler.animate_final(0.75).unwrap();

    assert!(hand_origin(&dancer).abs_diff_eq(Vec3::new(2.0, 0.0, 2.0), 1e-5));
    assert!(hand_origin(&idler).abs_diff_eq(Vec3::new(1.0, 0.0, 2.0), 1e-5));
    assert_eq!(idler.pose(), model.base_skeleton());

    dancer.set_mesh_render_state("hand", RenderState::Hidden);
    assert_eq!(
        idler.model().unwrap().mesh_by_name("hand").unwrap().render_state(),
        RenderState::Visible
    );
}

#[test]
fn test_hidden_mesh_is_not_skinned() {
    let mut object = guard_with(&[("wave", &[1.0, 2.0, 3.0])]);
    object.drop_anim(0.0, "wave").unwrap();
    assert!(object.set_mesh_render_state("hand", RenderState::Hidden));

    object.animate_final(0.75).unwrap();
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(1.0, 0.0, 2.0), 1e-5));
}

#[test]
fn test_bounding_box_follows_frames() {
    let mut object = guard_with(&[("wave", &[1.0, 2.0, 3.0])]);
    object.drop_anim(0.0, "wave").unwrap();
    let transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
    object.set_transform(transform);

    object.animate_final(0.75).unwrap();
    let bounds = object.compute_bounding_box().unwrap();
    assert_eq!(bounds.center, Vec3::new(0.75, 0.0, 1.5));
    assert_eq!(bounds.extent, Vec3::new(1.75, 1.0, 1.5));
    assert_eq!(bounds.world, transform);
    assert_eq!(object.bounding_box(), &bounds);
}

#[test]
fn test_transition_clips_from_disk() {
    let (dir, mesh_path) = guard_on_disk(&[
        ("wave", &[1.0, 2.0, 3.0]),
        ("walk", &[5.0, 6.0]),
        ("wave_to_walk", &[10.0, 20.0]),
    ]);
    let model = Arc::new(Md5Model::load(&mesh_path).unwrap());
    let mut object = Md5Object::with_model(model);

    for name in ["wave", "walk"] {
        object
            .add_animation_file(dir.path().join(format!("{name}.md5anim")), ClipKind::Playable)
            .unwrap();
    }
    object
        .add_animation_file(dir.path().join("wave_to_walk.md5anim"), ClipKind::Transition)
        .unwrap();

    object.drop_anim(0.0, "wave").unwrap();
    object.drop_anim(2.5, "walk").unwrap();
    assert_eq!(object.total_time(), 3.5);

    // without a registered transition the clips are blended directly
    let phase = object.animate_final(2.0).unwrap();
    assert_eq!(phase, TimelinePhase::EnteringNext {
        index: 0,
        fraction: 0.5
    });
    assert!(object.state().is_crossing());
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(4.0, 0.0, 2.0), 1e-5));

    object.register_transition("wave", "walk", "wave_to_walk").unwrap();
    object.animate_final(2.0).unwrap();
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(15.0, 0.0, 2.0), 1e-5));
}

#[test]
fn test_library_switching() {
    let mut object = guard_with(&[("idle", &[0.0, 0.0]), ("wave", &[1.0, 2.0, 3.0])]);

    assert!(object.set_anim("idle"));
    assert_eq!(object.next_anim().unwrap().name(), "wave");

    object.animate(0.5);
    object.prepare().unwrap();
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(2.0, 0.0, 2.0), 1e-5));

    assert!(!object.set_anim("run"));
    assert!(hand_origin(&object).abs_diff_eq(Vec3::new(1.0, 0.0, 2.0), 1e-5));
}
