//! Keyframe clipboard, duplication and temporal-deletion services.
//!
//! Everything here is a pure data transformation over the scene model plus
//! the matching stage bookkeeping; nothing raises, missing entities are
//! no-op results.

use kurbo::Point;

use crate::{
    core::FrameIndex,
    naming::unique_name,
    scene::{ObjectStateMap, PuppetStateMap, SceneModel, SceneSnapshot},
    stage::{Node, NodeStage},
};

/// Deep copy of one keyframe's payload, tagged with its source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeClipboard {
    pub objects: ObjectStateMap,
    pub puppets: PuppetStateMap,
    pub source_index: FrameIndex,
}

/// Copy the keyframe at `index` into a clipboard value, or `None` when the
/// frame holds no keyframe.
pub fn copy_keyframe(model: &SceneModel, index: FrameIndex) -> Option<KeyframeClipboard> {
    let kf = model.keyframes.get(&index)?;
    Some(KeyframeClipboard {
        objects: kf.objects.clone(),
        puppets: kf.puppets.clone(),
        source_index: index,
    })
}

/// Apply `clipboard` at `index`, replacing (not merging) the target
/// keyframe's contents and creating it when absent. Returns whether
/// anything was pasted.
pub fn paste_keyframe(
    model: &mut SceneModel,
    clipboard: Option<&KeyframeClipboard>,
    index: FrameIndex,
) -> bool {
    let Some(clipboard) = clipboard else {
        return false;
    };
    model.add_keyframe(
        index,
        SceneSnapshot {
            objects: clipboard.objects.clone(),
            puppets: clipboard.puppets.clone(),
        },
    );
    true
}

/// Duplicate an object under a uniquified name, offset by a fixed (10, 10)
/// and attached to the same member when the source was attached. The
/// duplicate's state is captured into the current frame's keyframe.
/// Returns the new name, or `None` when the source is missing.
pub fn duplicate_object(
    model: &mut SceneModel,
    stage: &mut dyn NodeStage,
    name: &str,
) -> Option<String> {
    let src = model.objects.get(name)?.clone();
    let new_name = unique_name(name, model.objects.keys().map(String::as_str));

    let mut dup = src.clone();
    dup.name = new_name.clone();
    dup.x += 10.0;
    dup.y += 10.0;
    model.add_object(dup);

    // Cloning the source node keeps the parent reference, so an attached
    // duplicate stays expressed in the same member-local frame.
    let node = match stage_node_of(stage, name) {
        Some(mut node) => {
            node.position += kurbo::Vec2::new(10.0, 10.0);
            node
        }
        None => Node {
            position: Point::new(src.x + 10.0, src.y + 10.0),
            rotation: src.rotation,
            scale: if src.scale > 0.0 { src.scale } else { 1.0 },
            z: f64::from(src.z),
            ..Node::default()
        },
    };
    stage.add_node(&new_name, node);

    record_object_in_current_keyframe(model, &new_name);
    tracing::debug!(source = name, duplicate = %new_name, "object duplicated");
    Some(new_name)
}

fn stage_node_of(stage: &dyn NodeStage, key: &str) -> Option<Node> {
    if !stage.contains(key) {
        return None;
    }
    Some(Node {
        position: stage.position(key)?,
        rotation: stage.rotation(key)?,
        scale: stage.scale(key)?,
        z: stage.z(key)?,
        parent: stage.parent(key),
        visible: stage.visible(key)?,
        origin: stage.origin(key)?,
        bbox: stage.bbox(key)?,
    })
}

/// Remove the object's entry from every keyframe at or after the current
/// frame (temporal deletion) and hide its node. Earlier keyframes are left
/// untouched. Returns whether anything was removed.
pub fn delete_object_from_current_frame(
    model: &mut SceneModel,
    stage: &mut dyn NodeStage,
    name: &str,
) -> bool {
    let cur = model.current_frame;
    if !model.keyframes.contains_key(&cur) {
        let snapshot = model.capture_scene_state();
        model.add_keyframe(cur, snapshot);
    }
    let mut removed = false;
    for (_, kf) in model.keyframes.range_mut(cur..) {
        removed |= kf.objects.remove(name).is_some();
    }
    stage.set_visible(name, false);
    tracing::debug!(name, from = %cur, removed, "temporal deletion");
    removed
}

/// Record the chosen variant for a puppet slot into the current frame's
/// keyframe, creating the keyframe when absent.
pub fn set_member_variant(model: &mut SceneModel, puppet: &str, slot: &str, variant: &str) {
    let cur = model.current_frame;
    if !model.keyframes.contains_key(&cur) {
        let snapshot = model.capture_scene_state();
        model.add_keyframe(cur, snapshot);
    }
    if let Some(kf) = model.keyframes.get_mut(&cur) {
        kf.puppets
            .entry(puppet.to_string())
            .or_default()
            .variants
            .insert(slot.to_string(), variant.to_string());
    }
}

/// Capture the object's live state into the current frame's keyframe,
/// creating the keyframe (from the full scene state) when absent.
pub(crate) fn record_object_in_current_keyframe(model: &mut SceneModel, name: &str) {
    let cur = model.current_frame;
    if !model.keyframes.contains_key(&cur) {
        let snapshot = model.capture_scene_state();
        model.add_keyframe(cur, snapshot);
    }
    let Some(state) = model.objects.get(name).map(|obj| obj.state()) else {
        return;
    };
    if let Some(kf) = model.keyframes.get_mut(&cur) {
        kf.objects.insert(name.to_string(), state);
    }
}
