//! Scene data model: objects, puppets, keyframes and timing settings.
//!
//! Pure storage plus invariants; no transform math lives here. Keyframes
//! are keyed by [`FrameIndex`] in a `BTreeMap`, so iteration is always in
//! ascending frame order.

use std::collections::BTreeMap;

use kurbo::Point;

use crate::{
    core::FrameIndex,
    rig::{PoseInputs, Rig},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Image,
    Svg,
    Light,
}

/// Attachment of a free object onto a puppet member, by names.
/// Persists as a `[puppet, member]` pair.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Attachment {
    pub puppet: String,
    pub member: String,
}

impl Attachment {
    pub fn new(puppet: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            puppet: puppet.into(),
            member: member.into(),
        }
    }
}

impl From<(String, String)> for Attachment {
    fn from((puppet, member): (String, String)) -> Self {
        Self { puppet, member }
    }
}

impl From<Attachment> for (String, String) {
    fn from(a: Attachment) -> Self {
        (a.puppet, a.member)
    }
}

/// A free-floating or attachable scene entity. Coordinates are scene-global
/// when free and local to the parent member when attached.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub file_path: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale: f64,
    pub z: i32,
    pub attached_to: Option<Attachment>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            file_path: file_path.into(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0,
            z: 0,
            attached_to: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn attach(&mut self, puppet: impl Into<String>, member: impl Into<String>) {
        self.attached_to = Some(Attachment::new(puppet, member));
    }

    pub fn detach(&mut self) {
        self.attached_to = None;
    }

    /// Full state snapshot, including asset metadata for round-trip.
    pub fn state(&self) -> ObjectState {
        ObjectState {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale: self.scale,
            z: self.z,
            attached_to: self.attached_to.clone(),
            obj_type: Some(self.kind),
            file_path: Some(self.file_path.clone()),
        }
    }

    /// Apply transform fields from a state snapshot (metadata untouched).
    pub fn apply_state(&mut self, state: &ObjectState) {
        self.x = state.x;
        self.y = state.y;
        self.rotation = state.rotation;
        self.scale = state.scale;
        self.z = state.z;
        self.attached_to = state.attached_to.clone();
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Per-keyframe object snapshot. Unknown fields in persisted documents are
/// tolerated on import.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectState {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub z: i32,
    #[serde(default)]
    pub attached_to: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_type: Option<ObjectKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0,
            z: 0,
            attached_to: None,
            obj_type: None,
            file_path: None,
        }
    }
}

/// Per-keyframe member snapshot. `pos` is stored for root members only;
/// every other member derives its position through propagation.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemberState {
    #[serde(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<(f64, f64)>,
}

/// Per-keyframe puppet snapshot: member states plus the active-variant
/// selection, which persists under the reserved `_variants` key.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PuppetState {
    #[serde(
        rename = "_variants",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub variants: BTreeMap<String, String>,
    #[serde(flatten)]
    pub members: BTreeMap<String, MemberState>,
}

pub type ObjectStateMap = BTreeMap<String, ObjectState>;
pub type PuppetStateMap = BTreeMap<String, PuppetState>;

/// The objects/puppets payload of one keyframe (also the clipboard shape).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub objects: ObjectStateMap,
    #[serde(default)]
    pub puppets: PuppetStateMap,
}

/// Snapshot of the scene state at a given frame.
///
/// Presence of an object name is itself meaningful: an object absent from
/// the nearest preceding keyframe is hidden from that frame onward
/// (temporal deletion), not merely unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub index: FrameIndex,
    pub objects: ObjectStateMap,
    pub puppets: PuppetStateMap,
}

impl Keyframe {
    pub fn new(index: FrameIndex) -> Self {
        Self {
            index,
            objects: BTreeMap::new(),
            puppets: BTreeMap::new(),
        }
    }
}

/// A rig placed in the scene, with its live local pose and placement
/// bookkeeping (asset path, uniform scale, z offset).
#[derive(Clone, Debug, Default)]
pub struct PuppetInstance {
    pub rig: Rig,
    pub path: Option<String>,
    pub scale: f64,
    pub rotation: f64,
    pub z_offset: i32,
    /// Current local rotations and root positions, mutated by editing and
    /// by the state applier.
    pub pose: PoseInputs,
}

impl PuppetInstance {
    pub fn new(rig: Rig) -> Self {
        Self {
            rig,
            path: None,
            scale: 1.0,
            rotation: 0.0,
            z_offset: 0,
            pose: PoseInputs::default(),
        }
    }

    /// Capture the live pose as keyframe member states: local rotation for
    /// everyone, position only for roots.
    pub fn capture_state(&self) -> PuppetState {
        let mut state = PuppetState::default();
        let roots: Vec<&str> = self
            .rig
            .root_members()
            .into_iter()
            .map(|id| self.rig.get(id).name.as_str())
            .collect();
        for name in self.rig.member_names() {
            let rotation = self.pose.local_rotation.get(name).copied().unwrap_or(0.0);
            let pos = if roots.contains(&name) {
                let p = self
                    .pose
                    .root_pos
                    .get(name)
                    .copied()
                    .unwrap_or(Point::ZERO);
                Some((p.x, p.y))
            } else {
                None
            };
            state
                .members
                .insert(name.to_string(), MemberState { rotation, pos });
        }
        state
    }
}

/// Central store for puppets, objects and timeline keyframes.
///
/// One explicitly-owned instance per editing session; every operation
/// leaves it consistent before returning.
#[derive(Clone, Debug)]
pub struct SceneModel {
    pub puppets: BTreeMap<String, PuppetInstance>,
    pub objects: BTreeMap<String, SceneObject>,
    pub keyframes: BTreeMap<FrameIndex, Keyframe>,
    pub current_frame: FrameIndex,
    pub start_frame: FrameIndex,
    pub end_frame: FrameIndex,
    pub fps: u32,
    pub scene_width: u32,
    pub scene_height: u32,
    pub background_path: Option<String>,
}

impl Default for SceneModel {
    fn default() -> Self {
        Self {
            puppets: BTreeMap::new(),
            objects: BTreeMap::new(),
            keyframes: BTreeMap::new(),
            current_frame: FrameIndex(0),
            start_frame: FrameIndex(0),
            end_frame: FrameIndex(100),
            fps: 24,
            scene_width: 1920,
            scene_height: 1080,
            background_path: None,
        }
    }
}

impl SceneModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_puppet(&mut self, name: impl Into<String>, puppet: PuppetInstance) {
        self.puppets.insert(name.into(), puppet);
    }

    pub fn remove_puppet(&mut self, name: &str) -> bool {
        self.puppets.remove(name).is_some()
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.insert(object.name.clone(), object);
    }

    pub fn remove_object(&mut self, name: &str) -> bool {
        self.objects.remove(name).is_some()
    }

    pub fn attach_object(&mut self, obj_name: &str, puppet: &str, member: &str) -> bool {
        match self.objects.get_mut(obj_name) {
            Some(obj) => {
                obj.attach(puppet, member);
                true
            }
            None => false,
        }
    }

    pub fn detach_object(&mut self, obj_name: &str) -> bool {
        match self.objects.get_mut(obj_name) {
            Some(obj) => {
                obj.detach();
                true
            }
            None => false,
        }
    }

    /// Create or overwrite the keyframe at `index`, replacing (not merging)
    /// its objects/puppets with `snapshot`.
    pub fn add_keyframe(&mut self, index: FrameIndex, snapshot: SceneSnapshot) -> &mut Keyframe {
        let kf = self
            .keyframes
            .entry(index)
            .or_insert_with(|| Keyframe::new(index));
        kf.objects = snapshot.objects;
        kf.puppets = snapshot.puppets;
        kf
    }

    pub fn remove_keyframe(&mut self, index: FrameIndex) -> bool {
        self.keyframes.remove(&index).is_some()
    }

    /// Move the current-frame pointer without applying any state.
    pub fn go_to_frame(&mut self, index: FrameIndex) {
        self.current_frame = index;
    }

    /// Capture the live state of every object and puppet into a snapshot.
    pub fn capture_scene_state(&self) -> SceneSnapshot {
        SceneSnapshot {
            objects: self
                .objects
                .iter()
                .map(|(name, obj)| (name.clone(), obj.state()))
                .collect(),
            puppets: self
                .puppets
                .iter()
                .map(|(name, puppet)| (name.clone(), puppet.capture_state()))
                .collect(),
        }
    }

    /// Update the playback rate; zero is rejected as a no-op.
    pub fn set_fps(&mut self, fps: u32) -> bool {
        if fps == 0 {
            tracing::warn!("ignoring fps = 0");
            return false;
        }
        self.fps = fps;
        true
    }

    pub fn set_range(&mut self, start: FrameIndex, end: FrameIndex) {
        self.start_frame = start;
        self.end_frame = end;
    }

    pub fn set_scene_size(&mut self, width: u32, height: u32) {
        self.scene_width = width;
        self.scene_height = height;
    }

    pub fn set_background_path(&mut self, path: Option<String>) {
        self.background_path = path;
    }
}
