//! State applier: resolve per-entity effective state for a target frame.
//!
//! Given the scene model and a frame index, determines interpolated or
//! stepped poses for every puppet member and every object, then pushes the
//! result to the presentation layer through [`NodeStage`]. Puppet children
//! always follow their interpolated/stepped parents via rig propagation.

use std::collections::BTreeMap;
use std::ops::Bound;

use kurbo::Point;

use crate::{
    core::{FrameIndex, lerp, lerp_angle},
    naming::member_key,
    rig::PuppetPose,
    scene::{ObjectState, PuppetInstance, SceneModel},
    stage::{Node, NodeStage},
};

/// Apply the current frame's state from the model to the stage.
///
/// No-op when the scene has no keyframes at all.
pub fn apply_frame(model: &mut SceneModel, stage: &mut dyn NodeStage) {
    if model.keyframes.is_empty() {
        return;
    }
    let index = model.current_frame;
    apply_puppet_states(model, stage, index);
    apply_object_states(model, stage, index);
}

/// Instantiate a puppet's member nodes on the stage and place its roots at
/// `pos`. Returns `false` when the puppet is unknown.
pub fn spawn_puppet(
    model: &mut SceneModel,
    stage: &mut dyn NodeStage,
    name: &str,
    pos: Point,
) -> bool {
    let Some(instance) = model.puppets.get_mut(name) else {
        return false;
    };
    for member in instance.rig.members() {
        stage.add_node(
            &member_key(name, &member.name),
            Node {
                scale: instance.scale,
                z: f64::from(member.z_order + instance.z_offset),
                origin: member.pivot,
                bbox: member.bbox,
                ..Node::default()
            },
        );
    }
    for root in instance.rig.root_members() {
        let root_name = instance.rig.get(root).name.clone();
        instance.pose.root_pos.insert(root_name, pos);
    }
    let pose = instance.rig.propagate(&instance.pose, instance.scale);
    write_pose(stage, name, instance, &pose);
    true
}

/// Resolve and apply puppet poses for `index`.
///
/// Variant visibility comes from the last keyframe at or before `index`
/// (first candidate per slot by default) and never interpolates. Member
/// rotations interpolate along the shortest arc between the bracketing
/// keyframes; positions interpolate for root members only. With a single
/// boundary keyframe the pose snaps to it.
#[tracing::instrument(skip(model, stage))]
pub fn apply_puppet_states(model: &mut SceneModel, stage: &mut dyn NodeStage, index: FrameIndex) {
    let keyframes = &model.keyframes;
    let prev_idx = keyframes.range(..=index).next_back().map(|(i, _)| *i);
    let next_idx = keyframes
        .range((Bound::Excluded(index), Bound::Unbounded))
        .next()
        .map(|(i, _)| *i);

    for (pname, instance) in model.puppets.iter_mut() {
        apply_variant_visibility(stage, pname, instance, keyframes, prev_idx);

        match (prev_idx, next_idx) {
            (Some(prev), Some(next)) if prev != next => {
                let ratio = (index.0 - prev.0) as f64 / (next.0 - prev.0) as f64;
                let prev_pose = keyframes[&prev].puppets.get(pname);
                let next_pose = keyframes[&next].puppets.get(pname);
                let (Some(prev_pose), Some(next_pose)) = (prev_pose, next_pose) else {
                    continue;
                };
                let roots = root_names(instance);
                for member_name in instance.rig.member_names() {
                    let (Some(a), Some(b)) = (
                        prev_pose.members.get(member_name),
                        next_pose.members.get(member_name),
                    ) else {
                        continue;
                    };
                    instance
                        .pose
                        .local_rotation
                        .insert(member_name.to_string(), lerp_angle(a.rotation, b.rotation, ratio));
                    if roots.iter().any(|r| r == member_name) {
                        match (a.pos, b.pos) {
                            (Some(p), Some(n)) => {
                                instance.pose.root_pos.insert(
                                    member_name.to_string(),
                                    Point::new(lerp(p.0, n.0, ratio), lerp(p.1, n.1, ratio)),
                                );
                            }
                            (Some(p), None) => {
                                instance
                                    .pose
                                    .root_pos
                                    .insert(member_name.to_string(), Point::new(p.0, p.1));
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {
                // Snap to whichever boundary exists, preferring prev.
                let Some(target) = prev_idx.or(next_idx) else {
                    continue;
                };
                let Some(state) = keyframes[&target].puppets.get(pname) else {
                    continue;
                };
                let roots = root_names(instance);
                for member_name in instance.rig.member_names() {
                    let Some(member_state) = state.members.get(member_name) else {
                        continue;
                    };
                    instance
                        .pose
                        .local_rotation
                        .insert(member_name.to_string(), member_state.rotation);
                    if roots.iter().any(|r| r == member_name)
                        && let Some((x, y)) = member_state.pos
                    {
                        instance
                            .pose
                            .root_pos
                            .insert(member_name.to_string(), Point::new(x, y));
                    }
                }
            }
        }

        // Children follow interpolated/stepped parents.
        let pose = instance.rig.propagate(&instance.pose, instance.scale);
        write_pose(stage, pname, instance, &pose);
    }
}

fn root_names(instance: &PuppetInstance) -> Vec<String> {
    instance
        .rig
        .root_members()
        .into_iter()
        .map(|id| instance.rig.get(id).name.clone())
        .collect()
}

fn apply_variant_visibility(
    stage: &mut dyn NodeStage,
    pname: &str,
    instance: &PuppetInstance,
    keyframes: &BTreeMap<FrameIndex, crate::scene::Keyframe>,
    prev_idx: Option<FrameIndex>,
) {
    if instance.rig.variants.is_empty() {
        return;
    }
    let chosen: BTreeMap<String, String> = prev_idx
        .and_then(|i| keyframes[&i].puppets.get(pname))
        .map(|state| state.variants.clone())
        .unwrap_or_default();
    for (slot, candidates) in &instance.rig.variants {
        let target = chosen
            .get(slot)
            .map(String::as_str)
            .or_else(|| candidates.first().map(String::as_str));
        for candidate in candidates {
            stage.set_visible(
                &member_key(pname, candidate),
                Some(candidate.as_str()) == target,
            );
        }
    }
}

/// Push a propagated pose onto the stage. Member nodes keep their pivot as
/// transform origin, so the node position is the world pivot minus the
/// pivot offset.
fn write_pose(stage: &mut dyn NodeStage, pname: &str, instance: &PuppetInstance, pose: &PuppetPose) {
    for (member_name, member_pose) in &pose.members {
        let Some(member) = instance.rig.member(member_name) else {
            continue;
        };
        let key = member_key(pname, member_name);
        stage.set_position(&key, member_pose.world_pivot - member.pivot.to_vec2());
        stage.set_rotation(&key, member_pose.world_rotation);
    }
}

enum ObjectResolution<'a> {
    /// The last keyframe at or before the index omits the object: hidden
    /// from that frame onward until a keyframe re-introduces it.
    Hidden,
    Found {
        prev: (FrameIndex, &'a ObjectState),
        next: Option<(FrameIndex, &'a ObjectState)>,
    },
}

fn resolve_object<'a>(
    keyframes: &'a BTreeMap<FrameIndex, crate::scene::Keyframe>,
    name: &str,
    index: FrameIndex,
) -> ObjectResolution<'a> {
    if let Some((_, kf)) = keyframes.range(..=index).next_back()
        && !kf.objects.contains_key(name)
    {
        return ObjectResolution::Hidden;
    }
    let prev = keyframes
        .range(..=index)
        .rev()
        .find_map(|(i, kf)| kf.objects.get(name).map(|st| (*i, st)));
    let next = keyframes
        .range((Bound::Excluded(index), Bound::Unbounded))
        .find_map(|(i, kf)| kf.objects.get(name).map(|st| (*i, st)));
    match prev {
        Some(prev) => ObjectResolution::Found { prev, next },
        None => ObjectResolution::Hidden,
    }
}

/// Resolve and apply object poses and visibility for `index`.
///
/// Interpolation requires bracketing states that share the same attachment
/// target (the same coordinate space); otherwise the object steps to the
/// previous state. Z-order and attachment are always taken from the
/// previous state.
#[tracing::instrument(skip(model, stage))]
pub fn apply_object_states(model: &SceneModel, stage: &mut dyn NodeStage, index: FrameIndex) {
    let mut updated = 0usize;
    for name in model.objects.keys() {
        let resolution = resolve_object(&model.keyframes, name, index);
        let ObjectResolution::Found { prev, next } = resolution else {
            stage.set_visible(name, false);
            continue;
        };
        let (prev_idx, prev_state) = prev;

        if !stage.contains(name) {
            stage.add_node(name, node_from_state(prev_state));
        }
        stage.set_visible(name, true);

        // Same-coordinate-space gate: interpolation needs bracketing states
        // with the identical attachment target.
        let interp = next.filter(|(next_idx, next_state)| {
            *next_idx != prev_idx
                && *next_idx > index
                && next_state.attached_to == prev_state.attached_to
        });

        reparent(stage, name, prev_state);
        if let Some((next_idx, next_state)) = interp {
            let t = (index.0 - prev_idx.0) as f64 / (next_idx.0 - prev_idx.0) as f64;
            stage.set_position(
                name,
                Point::new(
                    lerp(prev_state.x, next_state.x, t),
                    lerp(prev_state.y, next_state.y, t),
                ),
            );
            stage.set_rotation(name, lerp_angle(prev_state.rotation, next_state.rotation, t));
            stage.set_scale(name, lerp(prev_state.scale, next_state.scale, t));
        } else {
            stage.set_position(name, Point::new(prev_state.x, prev_state.y));
            stage.set_rotation(name, prev_state.rotation);
            stage.set_scale(name, prev_state.scale);
        }
        stage.set_z(name, f64::from(prev_state.z));
        updated += 1;
    }
    tracing::debug!(updated, "applied object states");
}

/// Match the node's parent to the resolved attachment target. A named
/// member that has no stage node leaves the current parent untouched.
fn reparent(stage: &mut dyn NodeStage, name: &str, state: &ObjectState) {
    match &state.attached_to {
        Some(att) => {
            let parent_key = member_key(&att.puppet, &att.member);
            if stage.contains(&parent_key) && stage.parent(name).as_deref() != Some(&*parent_key) {
                stage.set_parent(name, Some(&parent_key));
            }
        }
        None => {
            if stage.parent(name).is_some() {
                stage.set_parent(name, None);
            }
        }
    }
}

fn node_from_state(state: &ObjectState) -> Node {
    Node {
        position: Point::new(state.x, state.y),
        rotation: state.rotation,
        scale: if state.scale > 0.0 { state.scale } else { 1.0 },
        z: f64::from(state.z),
        ..Node::default()
    }
}
