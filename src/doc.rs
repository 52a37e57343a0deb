//! Persisted scene document: serde types, validation and model import/export.
//!
//! The on-disk shape is JSON with four top-level sections: `settings`,
//! `objects`, `puppets_data` and `keyframes`. Imports are all-or-nothing:
//! a document that fails validation is rejected with the accumulated
//! diagnostics and the model falls back to a blank scene, never a
//! partially-applied one.

use std::collections::BTreeMap;
use std::path::Path;

use kurbo::Point;

use crate::{
    core::FrameIndex,
    error::{PantinError, PantinResult},
    scene::{ObjectKind, ObjectStateMap, PuppetStateMap, SceneModel, SceneObject, SceneSnapshot},
};

/// Timing and canvas settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub start_frame: FrameIndex,
    pub end_frame: FrameIndex,
    pub fps: u32,
    pub scene_width: u32,
    pub scene_height: u32,
    pub background_path: Option<String>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        let model = SceneModel::default();
        Self {
            start_frame: model.start_frame,
            end_frame: model.end_frame,
            fps: model.fps,
            scene_width: model.scene_width,
            scene_height: model.scene_height,
            background_path: None,
        }
    }
}

/// Rig re-attachment hints for one puppet. `path` is stored relative to the
/// document; `abs_path` is an optional absolute fallback for documents
/// moved between machines.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PuppetRecord {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub position: (f64, f64),
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub z_offset: i32,
}

fn one() -> f64 {
    1.0
}

/// One keyframe entry in the persisted `keyframes` list.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyframeRecord {
    #[serde(default)]
    pub index: FrameIndex,
    #[serde(default)]
    pub objects: ObjectStateMap,
    #[serde(default)]
    pub puppets: PuppetStateMap,
}

/// The full persisted scene document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub settings: SceneSettings,
    #[serde(default)]
    pub objects: ObjectStateMap,
    #[serde(default)]
    pub puppets_data: BTreeMap<String, PuppetRecord>,
    #[serde(default)]
    pub keyframes: Vec<KeyframeRecord>,
}

/// Validate an untrusted document value, accumulating every violation
/// instead of stopping at the first.
pub fn validate_document(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let Some(doc) = value.as_object() else {
        return Err(vec!["document root must be an object".to_string()]);
    };

    if let Some(settings) = doc.get("settings") {
        match settings.as_object() {
            Some(settings) => {
                let mut int_field = |key: &str| -> Option<i64> {
                    let v = settings.get(key)?;
                    match v.as_i64() {
                        Some(n) if n >= 0 => Some(n),
                        Some(n) => {
                            errors.push(format!("settings.{key} must be non-negative, got {n}"));
                            None
                        }
                        None => {
                            errors.push(format!("settings.{key} must be an integer"));
                            None
                        }
                    }
                };
                let start = int_field("start_frame");
                let end = int_field("end_frame");
                let fps = int_field("fps");
                int_field("scene_width");
                int_field("scene_height");
                if let (Some(start), Some(end)) = (start, end)
                    && start > end
                {
                    errors.push(format!("settings: start_frame {start} > end_frame {end}"));
                }
                if fps == Some(0) {
                    errors.push("settings.fps must be positive".to_string());
                }
                if let Some(bg) = settings.get("background_path")
                    && !bg.is_string()
                    && !bg.is_null()
                {
                    errors.push("settings.background_path must be a string or null".to_string());
                }
            }
            None => errors.push("settings must be an object".to_string()),
        }
    }

    if let Some(objects) = doc.get("objects") {
        match objects.as_object() {
            Some(objects) => {
                for (name, entry) in objects {
                    if !entry.is_object() {
                        errors.push(format!("objects.{name} must be an object"));
                    }
                }
            }
            None => errors.push("objects must be a map".to_string()),
        }
    }

    if let Some(keyframes) = doc.get("keyframes") {
        match keyframes.as_array() {
            Some(entries) => {
                let mut seen = std::collections::BTreeSet::new();
                for (i, entry) in entries.iter().enumerate() {
                    let Some(entry) = entry.as_object() else {
                        errors.push(format!("keyframes[{i}] must be an object"));
                        continue;
                    };
                    if let Some(index) = entry.get("index") {
                        match index.as_i64() {
                            Some(index) => {
                                if !seen.insert(index) {
                                    errors.push(format!("duplicate keyframe index {index}"));
                                }
                            }
                            None => errors.push(format!("keyframes[{i}].index must be an integer")),
                        }
                    }
                }
            }
            None => errors.push("keyframes must be a list".to_string()),
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Export the live model into a document value.
///
/// Puppet hints record the first root's live position; the rig itself is
/// reconstructed from `path` on the loading side.
pub fn export_document(model: &SceneModel) -> SceneDocument {
    SceneDocument {
        settings: SceneSettings {
            start_frame: model.start_frame,
            end_frame: model.end_frame,
            fps: model.fps,
            scene_width: model.scene_width,
            scene_height: model.scene_height,
            background_path: model.background_path.clone(),
        },
        objects: model
            .objects
            .iter()
            .map(|(name, obj)| (name.clone(), obj.state()))
            .collect(),
        puppets_data: model
            .puppets
            .iter()
            .map(|(name, instance)| {
                let position = instance
                    .pose
                    .root_pos
                    .values()
                    .next()
                    .map(|p| (p.x, p.y))
                    .unwrap_or((0.0, 0.0));
                (
                    name.clone(),
                    PuppetRecord {
                        path: instance.path.clone(),
                        abs_path: None,
                        scale: instance.scale,
                        position,
                        rotation: instance.rotation,
                        z_offset: instance.z_offset,
                    },
                )
            })
            .collect(),
        keyframes: model
            .keyframes
            .values()
            .map(|kf| KeyframeRecord {
                index: kf.index,
                objects: kf.objects.clone(),
                puppets: kf.puppets.clone(),
            })
            .collect(),
    }
}

/// Apply a parsed document to the model.
///
/// Settings, objects and keyframes are rebuilt from the document. Puppet
/// hints are applied to instances already present under the same name;
/// rig construction from the recorded path is the caller's concern.
pub fn import_document(model: &mut SceneModel, doc: SceneDocument) {
    model.set_range(doc.settings.start_frame, doc.settings.end_frame);
    model.set_fps(doc.settings.fps);
    model.set_scene_size(doc.settings.scene_width, doc.settings.scene_height);
    model.set_background_path(doc.settings.background_path);

    model.objects.clear();
    for (name, state) in doc.objects {
        let kind = state.obj_type.unwrap_or(ObjectKind::Image);
        let file_path = state.file_path.clone().unwrap_or_default();
        let mut obj = SceneObject::new(name, kind, file_path);
        obj.apply_state(&state);
        model.add_object(obj);
    }

    for (name, record) in doc.puppets_data {
        let Some(instance) = model.puppets.get_mut(&name) else {
            tracing::warn!(name, "puppet hint without a live instance");
            continue;
        };
        instance.path = record.path.or(record.abs_path);
        instance.scale = if record.scale > 0.0 { record.scale } else { 1.0 };
        instance.rotation = record.rotation;
        instance.z_offset = record.z_offset;
        let (x, y) = record.position;
        for root in instance.rig.root_members() {
            let root_name = instance.rig.get(root).name.clone();
            instance.pose.root_pos.insert(root_name, Point::new(x, y));
        }
    }

    model.keyframes.clear();
    for record in doc.keyframes {
        model.add_keyframe(
            record.index,
            SceneSnapshot {
                objects: record.objects,
                puppets: record.puppets,
            },
        );
    }
    model.go_to_frame(model.start_frame);
}

/// Validate and apply a raw JSON value. On any violation the model is
/// reset to a blank scene and the diagnostics are returned as one error.
pub fn import_json(model: &mut SceneModel, value: &serde_json::Value) -> PantinResult<()> {
    if let Err(errors) = validate_document(value) {
        *model = SceneModel::new();
        return Err(PantinError::validation(errors.join("; ")));
    }
    let doc: SceneDocument = match serde_json::from_value(value.clone()) {
        Ok(doc) => doc,
        Err(err) => {
            *model = SceneModel::new();
            return Err(PantinError::serde(err.to_string()));
        }
    };
    import_document(model, doc);
    Ok(())
}

/// Read and validate a scene document from a JSON file.
pub fn read_document(path: &Path) -> PantinResult<SceneDocument> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| PantinError::document(format!("{}: {err}", path.display())))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|err| PantinError::serde(err.to_string()))?;
    validate_document(&value).map_err(|errors| PantinError::validation(errors.join("; ")))?;
    serde_json::from_value(value).map_err(|err| PantinError::serde(err.to_string()))
}

/// Write a scene document as pretty-printed JSON.
pub fn write_document(path: &Path, doc: &SceneDocument) -> PantinResult<()> {
    let text =
        serde_json::to_string_pretty(doc).map_err(|err| PantinError::serde(err.to_string()))?;
    std::fs::write(path, text)
        .map_err(|err| PantinError::document(format!("{}: {err}", path.display())))
}
