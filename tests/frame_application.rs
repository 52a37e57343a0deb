use std::collections::BTreeMap;

use kurbo::{Point, Rect};

use pantin::applier::{apply_frame, spawn_puppet};
use pantin::playback::Playback;
use pantin::scene::{MemberState, ObjectKind, PuppetInstance, PuppetState, SceneObject};
use pantin::services::{copy_keyframe, delete_object_from_current_frame, paste_keyframe};
use pantin::{FrameIndex, NodeStage, Rig, RigSource, SceneModel, Stage};

struct ArmSource;

impl RigSource for ArmSource {
    fn groups(&self) -> Vec<String> {
        vec!["torse".into(), "bras".into(), "main".into()]
    }

    fn bounding_box(&self, _group: &str) -> Option<Rect> {
        Some(Rect::new(0.0, 0.0, 20.0, 20.0))
    }

    fn pivot(&self, group: &str) -> Point {
        match group {
            "torse" => Point::new(0.0, 0.0),
            "bras" => Point::new(40.0, 0.0),
            _ => Point::new(90.0, 0.0),
        }
    }
}

fn arm_rig() -> Rig {
    Rig::build(
        &ArmSource,
        &[
            ("torse", None),
            ("bras", Some("torse")),
            ("main", Some("bras")),
        ],
        &BTreeMap::new(),
        &BTreeMap::new(),
    )
    .unwrap()
}

fn torse_kf(rotation: f64, pos: (f64, f64), bras_rotation: f64) -> PuppetState {
    let mut state = PuppetState::default();
    state.members.insert(
        "torse".to_string(),
        MemberState {
            rotation,
            pos: Some(pos),
        },
    );
    state.members.insert(
        "bras".to_string(),
        MemberState {
            rotation: bras_rotation,
            pos: None,
        },
    );
    state.members.insert("main".to_string(), MemberState::default());
    state
}

fn setup() -> (SceneModel, Stage) {
    let mut model = SceneModel::new();
    model.set_range(FrameIndex(0), FrameIndex(24));
    model.add_puppet("manu", PuppetInstance::new(arm_rig()));
    model.add_object(SceneObject::new("rock", ObjectKind::Image, "rock.png").at(100.0, 600.0));

    let mut stage = Stage::new();
    assert!(spawn_puppet(
        &mut model,
        &mut stage,
        "manu",
        Point::new(640.0, 360.0)
    ));
    (model, stage)
}

#[test]
fn ticking_through_a_pose_change_interpolates_the_whole_chain() {
    let (mut model, mut stage) = setup();
    let playback = Playback::new();

    let mut start = model.capture_scene_state();
    start
        .puppets
        .insert("manu".to_string(), torse_kf(0.0, (640.0, 360.0), 0.0));
    model.add_keyframe(FrameIndex(0), start);

    let mut end = model.capture_scene_state();
    end.puppets
        .insert("manu".to_string(), torse_kf(90.0, (640.0, 360.0), 0.0));
    model.add_keyframe(FrameIndex(12), end);

    for _ in 0..6 {
        assert!(playback.next_frame(&mut model, &mut stage));
    }
    assert_eq!(model.current_frame, FrameIndex(6));

    assert!((stage.rotation("manu:torse").unwrap() - 45.0).abs() < 1e-9);
    // Bras world rotation follows the torse; its world pivot sits on the
    // rel_pos offset (40, 0) rotated by 45 degrees around the torse pivot.
    assert!((stage.rotation("manu:bras").unwrap() - 45.0).abs() < 1e-9);
    let bras_pivot = stage.position("manu:bras").unwrap() + stage.origin("manu:bras").unwrap().to_vec2();
    let expected = Point::new(
        640.0 + 40.0 * std::f64::consts::FRAC_1_SQRT_2,
        360.0 + 40.0 * std::f64::consts::FRAC_1_SQRT_2,
    );
    assert!((bras_pivot - expected).hypot() < 1e-9);
}

#[test]
fn playback_stops_at_the_range_end() {
    let (mut model, mut stage) = setup();
    model.add_keyframe(FrameIndex(0), model.capture_scene_state());
    let playback = Playback::new();

    let mut ticks = 0;
    while playback.next_frame(&mut model, &mut stage) {
        ticks += 1;
        assert!(ticks <= 24, "playback failed to stop");
    }
    assert_eq!(model.current_frame, FrameIndex(24));
    assert!(!playback.next_frame(&mut model, &mut stage));
}

#[test]
fn pasted_keyframe_drives_the_stage_like_the_original() {
    let (mut model, mut stage) = setup();
    model.objects.get_mut("rock").unwrap().x = 250.0;
    model.add_keyframe(FrameIndex(0), model.capture_scene_state());

    let clip = copy_keyframe(&model, FrameIndex(0));
    assert!(paste_keyframe(&mut model, clip.as_ref(), FrameIndex(20)));

    model.go_to_frame(FrameIndex(20));
    apply_frame(&mut model, &mut stage);
    assert_eq!(stage.position("rock").unwrap().x, 250.0);
}

#[test]
fn deleted_object_stays_visible_before_the_cut() {
    let (mut model, mut stage) = setup();
    for i in [0, 8, 16] {
        model.add_keyframe(FrameIndex(i), model.capture_scene_state());
    }
    model.go_to_frame(FrameIndex(8));
    assert!(delete_object_from_current_frame(&mut model, &mut stage, "rock"));

    model.go_to_frame(FrameIndex(4));
    apply_frame(&mut model, &mut stage);
    assert_eq!(stage.visible("rock"), Some(true));

    model.go_to_frame(FrameIndex(12));
    apply_frame(&mut model, &mut stage);
    assert_eq!(stage.visible("rock"), Some(false));
}
