//! Coordinate-frame converter: attach a free object onto a rig member and
//! detach it again without any visual jump.
//!
//! Attaching decomposes the object's and the target member's world affine
//! transforms, re-expresses rotation/scale/position relative to the member's
//! frame and re-parents atomically. Detaching is the inverse, additionally
//! folding the former parent's z-order into the object's own z so relative
//! stacking is preserved. Both are failure-safe no-ops when the object or
//! member cannot be resolved.

use crate::{
    core::AffineParts,
    naming::member_key,
    scene::SceneModel,
    services::record_object_in_current_keyframe,
    stage::NodeStage,
};

/// Attach `obj_name` to `puppet`/`member`, preserving its world transform.
///
/// Returns `false` without touching anything when the object, its node or
/// the target member node is missing.
pub fn attach_object(
    model: &mut SceneModel,
    stage: &mut dyn NodeStage,
    obj_name: &str,
    puppet: &str,
    member: &str,
) -> bool {
    let parent_key = member_key(puppet, member);
    if !model.objects.contains_key(obj_name) || !stage.contains(obj_name) {
        return false;
    }
    let (Some(world), Some(parent_world)) = (
        stage.scene_transform(obj_name),
        stage.scene_transform(&parent_key),
    ) else {
        return false;
    };
    let Some(origin) = stage.origin(obj_name) else {
        return false;
    };

    let parts = AffineParts::decompose(world);
    let parent_parts = AffineParts::decompose(parent_world);
    let scene_pt = world * origin;

    let local_rotation = parts.rotation_deg - parent_parts.rotation_deg;
    let lx = parts.scale_x / nonzero_or_one(parent_parts.scale_x);
    let ly = parts.scale_y / nonzero_or_one(parent_parts.scale_y);
    let local_scale = if ly > 0.0 { (lx + ly) * 0.5 } else { lx };
    let local_pt = parent_world.inverse() * scene_pt;

    stage.set_parent(obj_name, Some(&parent_key));
    stage.set_rotation(obj_name, local_rotation);
    if !stage.set_scale(obj_name, local_scale) {
        tracing::warn!(obj_name, local_scale, "degenerate scale during attach");
    }
    stage.set_position(obj_name, local_pt - origin.to_vec2());

    model.attach_object(obj_name, puppet, member);
    sync_object_from_node(model, stage, obj_name);
    record_object_in_current_keyframe(model, obj_name);
    tracing::debug!(obj_name, puppet, member, "object attached");
    true
}

/// Detach `obj_name` from its parent, re-applying its world transform as
/// absolute values. Returns `false` when the object cannot be resolved.
pub fn detach_object(model: &mut SceneModel, stage: &mut dyn NodeStage, obj_name: &str) -> bool {
    if !model.objects.contains_key(obj_name) || !stage.contains(obj_name) {
        return false;
    }
    let (Some(world), Some(origin)) = (stage.scene_transform(obj_name), stage.origin(obj_name))
    else {
        return false;
    };
    let parts = AffineParts::decompose(world);
    let scene_pt = world * origin;
    let parent_z = stage
        .parent(obj_name)
        .and_then(|parent| stage.z(&parent))
        .unwrap_or(0.0);
    let own_z = stage.z(obj_name).unwrap_or(0.0);

    stage.set_parent(obj_name, None);
    if !stage.set_scale(obj_name, parts.uniform_scale()) {
        tracing::warn!(obj_name, "degenerate scale during detach");
    }
    stage.set_rotation(obj_name, parts.rotation_deg);
    stage.set_z(obj_name, own_z + parent_z);
    stage.set_position(obj_name, scene_pt - origin.to_vec2());

    model.detach_object(obj_name);
    sync_object_from_node(model, stage, obj_name);
    record_object_in_current_keyframe(model, obj_name);
    tracing::debug!(obj_name, "object detached");
    true
}

fn nonzero_or_one(v: f64) -> f64 {
    if v != 0.0 { v } else { 1.0 }
}

/// Copy the node's local transform back onto the model object.
fn sync_object_from_node(model: &mut SceneModel, stage: &dyn NodeStage, obj_name: &str) {
    let Some(obj) = model.objects.get_mut(obj_name) else {
        return;
    };
    if let Some(pos) = stage.position(obj_name) {
        obj.x = pos.x;
        obj.y = pos.y;
    }
    if let Some(rotation) = stage.rotation(obj_name) {
        obj.rotation = rotation;
    }
    if let Some(scale) = stage.scale(obj_name) {
        obj.scale = scale;
    }
    if let Some(z) = stage.z(obj_name) {
        obj.z = z as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ObjectKind, SceneObject};
    use crate::stage::{Node, Stage};
    use kurbo::Point;

    fn setup() -> (SceneModel, Stage) {
        let mut model = SceneModel::new();
        model.add_object(SceneObject::new("rock", ObjectKind::Svg, "rock.svg").at(200.0, 50.0));

        let mut stage = Stage::new();
        stage.add_node(
            "manu:bras",
            Node {
                position: Point::new(100.0, 100.0),
                rotation: 30.0,
                scale: 2.0,
                z: 3.0,
                origin: Point::new(10.0, 0.0),
                ..Node::default()
            },
        );
        stage.add_node(
            "rock",
            Node {
                position: Point::new(200.0, 50.0),
                rotation: 45.0,
                scale: 1.5,
                z: 1.0,
                origin: Point::new(4.0, 4.0),
                ..Node::default()
            },
        );
        (model, stage)
    }

    #[test]
    fn attach_preserves_world_transform() {
        let (mut model, mut stage) = setup();
        let before_pt = stage.map_to_scene("rock", Point::new(4.0, 4.0)).unwrap();
        let before = AffineParts::decompose(stage.scene_transform("rock").unwrap());

        assert!(attach_object(&mut model, &mut stage, "rock", "manu", "bras"));
        assert_eq!(stage.parent("rock").as_deref(), Some("manu:bras"));

        let after_pt = stage.map_to_scene("rock", Point::new(4.0, 4.0)).unwrap();
        let after = AffineParts::decompose(stage.scene_transform("rock").unwrap());
        assert!((after_pt - before_pt).hypot() < 1e-6);
        assert!((after.rotation_deg - before.rotation_deg).abs() < 1e-6);
        assert!((after.uniform_scale() - before.uniform_scale()).abs() < 1e-6);

        let obj = &model.objects["rock"];
        assert!(obj.attached_to.is_some());
        // Attachment was recorded in the current frame's keyframe.
        let kf = &model.keyframes[&model.current_frame];
        assert!(kf.objects["rock"].attached_to.is_some());
    }

    #[test]
    fn detach_restores_pre_attach_world_state() {
        let (mut model, mut stage) = setup();
        let before_pt = stage.map_to_scene("rock", Point::new(4.0, 4.0)).unwrap();
        let before = AffineParts::decompose(stage.scene_transform("rock").unwrap());

        assert!(attach_object(&mut model, &mut stage, "rock", "manu", "bras"));
        assert!(detach_object(&mut model, &mut stage, "rock"));
        assert_eq!(stage.parent("rock"), None);

        let after_pt = stage.map_to_scene("rock", Point::new(4.0, 4.0)).unwrap();
        let after = AffineParts::decompose(stage.scene_transform("rock").unwrap());
        assert!((after_pt - before_pt).hypot() < 1e-6);
        assert!((after.rotation_deg - before.rotation_deg).abs() < 1e-6);
        assert!((after.uniform_scale() - before.uniform_scale()).abs() < 1e-6);
        assert!(model.objects["rock"].attached_to.is_none());
    }

    #[test]
    fn detach_sums_parent_z() {
        let (mut model, mut stage) = setup();
        assert!(attach_object(&mut model, &mut stage, "rock", "manu", "bras"));
        let attached_z = stage.z("rock").unwrap();
        assert!(detach_object(&mut model, &mut stage, "rock"));
        assert!((stage.z("rock").unwrap() - (attached_z + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn attach_missing_entities_is_noop() {
        let (mut model, mut stage) = setup();
        assert!(!attach_object(&mut model, &mut stage, "ghost", "manu", "bras"));
        assert!(!attach_object(&mut model, &mut stage, "rock", "manu", "tete"));
        assert!(model.objects["rock"].attached_to.is_none());
        assert!(!detach_object(&mut model, &mut stage, "ghost"));
    }

    #[test]
    fn attach_guards_zero_parent_scale() {
        let (mut model, mut stage) = setup();
        // A degenerate parent can only come in through node construction;
        // the scale setter rejects zero.
        stage.add_node(
            "manu:plat",
            Node {
                scale: 0.0,
                ..Node::default()
            },
        );
        assert!(attach_object(&mut model, &mut stage, "rock", "manu", "plat"));
        // Divisor fell back to 1.0, so the object's world scale carries over.
        assert!((stage.scale("rock").unwrap() - 1.5).abs() < 1e-9);
    }
}
