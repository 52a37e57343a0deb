//! Static puppet rig definition and forward-kinematic transform propagation.
//!
//! A rig is a fixed-topology tree of named members built once from a
//! structural asset ([`RigSource`]). Members live in an arena indexed by
//! [`MemberId`]; parents are back-references, children are index lists, so
//! the tree carries no ownership cycles.

use std::collections::BTreeMap;

use kurbo::{Point, Rect, Vec2};

use crate::{
    core::rotate_vec,
    error::{PantinError, PantinResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub usize);

/// One limb of a rig: pivot (local rotation center, in source-asset
/// coordinates), bounding box, z-order and the fixed offset from its
/// parent's pivot.
#[derive(Clone, Debug)]
pub struct RigMember {
    pub name: String,
    pub parent: Option<MemberId>,
    pub children: Vec<MemberId>,
    pub pivot: Point,
    pub bbox: Rect,
    pub z_order: i32,
    /// `child.pivot - parent.pivot`, computed once at build time. Never
    /// recomputed except on a full rebuild.
    pub rel_pos: Vec2,
}

/// Contract with the external geometry source a rig is built from.
///
/// The engine never parses asset files itself; it only needs the group
/// names, their bounding boxes and pivot points.
pub trait RigSource {
    fn groups(&self) -> Vec<String>;
    fn bounding_box(&self, group: &str) -> Option<Rect>;
    fn pivot(&self, group: &str) -> Point;
}

/// Reverse mapping parent -> children, preserving `parent_map` order within
/// each child list.
pub fn compute_child_map(
    parent_map: &[(&str, Option<&str>)],
) -> BTreeMap<String, Vec<String>> {
    let mut child_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (child, parent) in parent_map {
        if let Some(parent) = parent {
            child_map
                .entry((*parent).to_string())
                .or_default()
                .push((*child).to_string());
        }
    }
    child_map
}

/// Variant-slot sidecar normalization.
///
/// Accepts the lenient shapes seen in sidecar files: a candidate may be a
/// bare string, a `{"name": ...}` map or a `[name, z]` pair. Malformed
/// entries are skipped.
pub fn normalize_variants(raw: &serde_json::Value) -> BTreeMap<String, Vec<String>> {
    let mut slots: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(map) = raw.as_object() else {
        return slots;
    };
    for (slot, candidates) in map {
        let Some(list) = candidates.as_array() else {
            continue;
        };
        let mut names = Vec::new();
        for entry in list {
            let name = match entry {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(obj) => {
                    obj.get("name").and_then(|v| v.as_str()).map(str::to_string)
                }
                serde_json::Value::Array(pair) => {
                    pair.first().and_then(|v| v.as_str()).map(str::to_string)
                }
                _ => None,
            };
            if let Some(name) = name {
                names.push(name);
            }
        }
        if !names.is_empty() {
            slots.insert(slot.clone(), names);
        }
    }
    slots
}

#[derive(Clone, Debug, Default)]
pub struct Rig {
    members: Vec<RigMember>,
    index: BTreeMap<String, MemberId>,
    child_map: BTreeMap<String, Vec<String>>,
    /// Named slots of mutually-exclusive member names; the first candidate
    /// is the default.
    pub variants: BTreeMap<String, Vec<String>>,
}

impl Rig {
    /// Build a rig from a structural asset and its hierarchy maps.
    ///
    /// Groups absent from `parent_map` are ignored. `pivot_map` lets a
    /// member borrow another group's pivot (e.g. the head pivoting at the
    /// neck). Fails on a member with two parents or on an unreachable
    /// member (cycle).
    pub fn build(
        source: &dyn RigSource,
        parent_map: &[(&str, Option<&str>)],
        pivot_map: &BTreeMap<String, String>,
        z_order_map: &BTreeMap<String, i32>,
    ) -> PantinResult<Self> {
        let known: BTreeMap<&str, Option<&str>> = parent_map.iter().copied().collect();
        let mut rig = Rig {
            child_map: compute_child_map(parent_map),
            ..Rig::default()
        };

        for group in source.groups() {
            if !known.contains_key(group.as_str()) {
                continue;
            }
            let bbox = source.bounding_box(&group).unwrap_or(Rect::ZERO);
            let pivot_group = pivot_map.get(&group).map_or(group.as_str(), String::as_str);
            let pivot = source.pivot(pivot_group);
            let z_order = z_order_map.get(&group).copied().unwrap_or(0);
            let id = MemberId(rig.members.len());
            rig.index.insert(group.clone(), id);
            rig.members.push(RigMember {
                name: group,
                parent: None,
                children: Vec::new(),
                pivot,
                bbox,
                z_order,
                rel_pos: Vec2::ZERO,
            });
        }

        for (child, parent) in parent_map {
            let (Some(&child_id), Some(&parent_id)) = (
                rig.index.get(*child),
                parent.and_then(|p| rig.index.get(p)),
            ) else {
                continue;
            };
            rig.link(parent_id, child_id)?;
        }

        rig.check_reachable()?;
        tracing::debug!(
            members = rig.members.len(),
            roots = rig.root_members().len(),
            "rig built"
        );
        Ok(rig)
    }

    fn link(&mut self, parent: MemberId, child: MemberId) -> PantinResult<()> {
        if self.members[child.0].parent.is_some() {
            return Err(PantinError::rig(format!(
                "member '{}' already has a parent",
                self.members[child.0].name
            )));
        }
        let rel_pos = self.members[child.0].pivot - self.members[parent.0].pivot;
        self.members[child.0].parent = Some(parent);
        self.members[child.0].rel_pos = rel_pos;
        self.members[parent.0].children.push(child);
        Ok(())
    }

    fn check_reachable(&self) -> PantinResult<()> {
        let mut seen = vec![false; self.members.len()];
        let mut stack: Vec<MemberId> = self.root_members();
        while let Some(id) = stack.pop() {
            if seen[id.0] {
                continue;
            }
            seen[id.0] = true;
            stack.extend(self.members[id.0].children.iter().copied());
        }
        if let Some(idx) = seen.iter().position(|&s| !s) {
            return Err(PantinError::rig(format!(
                "member '{}' is unreachable from any root (cycle in parent map)",
                self.members[idx].name
            )));
        }
        Ok(())
    }

    pub fn member_id(&self, name: &str) -> Option<MemberId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: MemberId) -> &RigMember {
        &self.members[id.0]
    }

    pub fn member(&self, name: &str) -> Option<&RigMember> {
        self.member_id(name).map(|id| self.get(id))
    }

    pub fn members(&self) -> impl Iterator<Item = &RigMember> {
        self.members.iter()
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members with no parent.
    pub fn root_members(&self) -> Vec<MemberId> {
        (0..self.members.len())
            .map(MemberId)
            .filter(|id| self.members[id.0].parent.is_none())
            .collect()
    }

    /// Pivot of the first child of `name`, or the origin if it has none.
    pub fn first_child_pivot(&self, name: &str) -> Point {
        self.child_map
            .get(name)
            .and_then(|children| children.first())
            .and_then(|child| self.member(child))
            .map_or(Point::ZERO, |m| m.pivot)
    }

    /// Walk the tree from roots to leaves computing per-member world
    /// rotation and world pivot position.
    ///
    /// Root members take their authoritative rotation/position from
    /// `inputs`; each child's pivot is its fixed `rel_pos` offset (scaled by
    /// the puppet's uniform scale), rotated by the parent's current world
    /// rotation and added to the parent's world pivot. World rotation is
    /// parent world rotation plus the child's own local rotation.
    pub fn propagate(&self, inputs: &PoseInputs, scale: f64) -> PuppetPose {
        let mut pose = PuppetPose::default();
        for root in self.root_members() {
            let member = self.get(root);
            let rotation = inputs.rotation_of(&member.name);
            let world_pivot = inputs.root_pos_of(&member.name) + member.pivot.to_vec2();
            pose.members.insert(
                member.name.clone(),
                MemberPose {
                    world_rotation: rotation,
                    world_pivot,
                },
            );
            self.propagate_children(root, rotation, world_pivot, inputs, scale, &mut pose);
        }
        pose
    }

    fn propagate_children(
        &self,
        parent: MemberId,
        parent_rotation: f64,
        parent_pivot: Point,
        inputs: &PoseInputs,
        scale: f64,
        pose: &mut PuppetPose,
    ) {
        for &child_id in &self.members[parent.0].children {
            let child = self.get(child_id);
            let offset = rotate_vec(child.rel_pos * scale, parent_rotation);
            let world_pivot = parent_pivot + offset;
            let world_rotation = parent_rotation + inputs.rotation_of(&child.name);
            pose.members.insert(
                child.name.clone(),
                MemberPose {
                    world_rotation,
                    world_pivot,
                },
            );
            self.propagate_children(child_id, world_rotation, world_pivot, inputs, scale, pose);
        }
    }
}

/// Authoritative local values fed into propagation: per-member local
/// rotations plus node positions for root members.
#[derive(Clone, Debug, Default)]
pub struct PoseInputs {
    pub local_rotation: BTreeMap<String, f64>,
    /// Root node positions (the point the member's local origin maps to in
    /// scene coordinates; the pivot lands at `pos + pivot`).
    pub root_pos: BTreeMap<String, Point>,
}

impl PoseInputs {
    fn rotation_of(&self, name: &str) -> f64 {
        self.local_rotation.get(name).copied().unwrap_or(0.0)
    }

    fn root_pos_of(&self, name: &str) -> Point {
        self.root_pos.get(name).copied().unwrap_or(Point::ZERO)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemberPose {
    pub world_rotation: f64,
    pub world_pivot: Point,
}

/// Effective world pose per member, produced by [`Rig::propagate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PuppetPose {
    pub members: BTreeMap<String, MemberPose>,
}
