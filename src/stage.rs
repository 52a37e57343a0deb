//! Collaborator contract with the presentation layer.
//!
//! The engine never assumes a rendering technology. It drives whatever
//! displays the scene through [`NodeStage`]: create/remove a visual node
//! per object or rig member, and set/get position, rotation, scale,
//! z-order, parent reference, visibility and bounding box on it. The
//! transform composition helpers are provided on top of those accessors.
//!
//! [`Stage`] is the in-memory implementation used by the engine's own
//! coordinate math and by tests.

use std::collections::BTreeMap;

use kurbo::{Affine, Point, Rect};

/// State of one visual node. `position` places the local origin in parent
/// coordinates; rotation and scale apply about `origin` (the transform
/// origin point, in local coordinates).
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub position: Point,
    pub rotation: f64,
    pub scale: f64,
    pub z: f64,
    pub parent: Option<String>,
    pub visible: bool,
    pub origin: Point,
    pub bbox: Rect,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            rotation: 0.0,
            scale: 1.0,
            z: 0.0,
            parent: None,
            visible: true,
            origin: Point::ZERO,
            bbox: Rect::ZERO,
        }
    }
}

/// The seven presentation-layer operations, plus node lifecycle.
///
/// Setters return `false` (and leave the node untouched) when the node is
/// missing or the value is rejected; getters return `None` for missing
/// nodes. Nothing here ever faults.
pub trait NodeStage {
    fn add_node(&mut self, key: &str, node: Node);
    fn remove_node(&mut self, key: &str) -> bool;
    fn contains(&self, key: &str) -> bool;

    fn position(&self, key: &str) -> Option<Point>;
    fn set_position(&mut self, key: &str, position: Point) -> bool;

    /// Rotation in degrees about the node's transform origin.
    fn rotation(&self, key: &str) -> Option<f64>;
    fn set_rotation(&mut self, key: &str, rotation: f64) -> bool;

    /// Uniform scale about the node's transform origin.
    fn scale(&self, key: &str) -> Option<f64>;
    /// Rejects non-positive scale values.
    fn set_scale(&mut self, key: &str, scale: f64) -> bool;

    fn z(&self, key: &str) -> Option<f64>;
    fn set_z(&mut self, key: &str, z: f64) -> bool;

    fn parent(&self, key: &str) -> Option<String>;
    fn set_parent(&mut self, key: &str, parent: Option<&str>) -> bool;

    fn visible(&self, key: &str) -> Option<bool>;
    fn set_visible(&mut self, key: &str, visible: bool) -> bool;

    fn origin(&self, key: &str) -> Option<Point>;
    fn bbox(&self, key: &str) -> Option<Rect>;

    /// Local-to-parent transform:
    /// T(position) * T(origin) * R(rotation) * S(scale) * T(-origin).
    fn local_transform(&self, key: &str) -> Option<Affine> {
        let position = self.position(key)?;
        let rotation = self.rotation(key)?;
        let scale = self.scale(key)?;
        let origin = self.origin(key)?;
        Some(
            Affine::translate(position.to_vec2())
                * Affine::translate(origin.to_vec2())
                * Affine::rotate(rotation.to_radians())
                * Affine::scale(scale)
                * Affine::translate(-origin.to_vec2()),
        )
    }

    /// Local-to-scene transform, composed along the parent chain.
    fn scene_transform(&self, key: &str) -> Option<Affine> {
        let mut transform = self.local_transform(key)?;
        let mut hops = 0usize;
        let mut cursor = self.parent(key);
        while let Some(parent) = cursor {
            // Parent chains are short; the hop cap only guards against a
            // malformed reparent loop.
            if hops > 1024 {
                return None;
            }
            transform = self.local_transform(&parent)? * transform;
            cursor = self.parent(&parent);
            hops += 1;
        }
        Some(transform)
    }

    fn map_to_scene(&self, key: &str, point: Point) -> Option<Point> {
        Some(self.scene_transform(key)? * point)
    }

    fn map_from_scene(&self, key: &str, point: Point) -> Option<Point> {
        Some(self.scene_transform(key)?.inverse() * point)
    }
}

/// In-memory scene graph implementing [`NodeStage`].
#[derive(Clone, Debug, Default)]
pub struct Stage {
    nodes: BTreeMap<String, Node>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    fn with_node(&mut self, key: &str, f: impl FnOnce(&mut Node)) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }
}

impl NodeStage for Stage {
    fn add_node(&mut self, key: &str, node: Node) {
        self.nodes.insert(key.to_string(), node);
    }

    fn remove_node(&mut self, key: &str) -> bool {
        self.nodes.remove(key).is_some()
    }

    fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    fn position(&self, key: &str) -> Option<Point> {
        self.nodes.get(key).map(|n| n.position)
    }

    fn set_position(&mut self, key: &str, position: Point) -> bool {
        self.with_node(key, |n| n.position = position)
    }

    fn rotation(&self, key: &str) -> Option<f64> {
        self.nodes.get(key).map(|n| n.rotation)
    }

    fn set_rotation(&mut self, key: &str, rotation: f64) -> bool {
        self.with_node(key, |n| n.rotation = rotation)
    }

    fn scale(&self, key: &str) -> Option<f64> {
        self.nodes.get(key).map(|n| n.scale)
    }

    fn set_scale(&mut self, key: &str, scale: f64) -> bool {
        if scale <= 0.0 {
            tracing::warn!(key, scale, "rejecting non-positive scale");
            return false;
        }
        self.with_node(key, |n| n.scale = scale)
    }

    fn z(&self, key: &str) -> Option<f64> {
        self.nodes.get(key).map(|n| n.z)
    }

    fn set_z(&mut self, key: &str, z: f64) -> bool {
        self.with_node(key, |n| n.z = z)
    }

    fn parent(&self, key: &str) -> Option<String> {
        self.nodes.get(key).and_then(|n| n.parent.clone())
    }

    fn set_parent(&mut self, key: &str, parent: Option<&str>) -> bool {
        if let Some(parent) = parent
            && !self.nodes.contains_key(parent)
        {
            return false;
        }
        self.with_node(key, |n| n.parent = parent.map(str::to_string))
    }

    fn visible(&self, key: &str) -> Option<bool> {
        self.nodes.get(key).map(|n| n.visible)
    }

    fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        self.with_node(key, |n| n.visible = visible)
    }

    fn origin(&self, key: &str) -> Option<Point> {
        self.nodes.get(key).map(|n| n.origin)
    }

    fn bbox(&self, key: &str) -> Option<Rect> {
        self.nodes.get(key).map(|n| n.bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_with(key: &str, node: Node) -> Stage {
        let mut stage = Stage::new();
        stage.add_node(key, node);
        stage
    }

    #[test]
    fn missing_nodes_are_noops() {
        let mut stage = Stage::new();
        assert!(!stage.set_position("ghost", Point::new(1.0, 2.0)));
        assert_eq!(stage.position("ghost"), None);
        assert!(!stage.remove_node("ghost"));
    }

    #[test]
    fn set_scale_rejects_non_positive() {
        let mut stage = stage_with("a", Node::default());
        assert!(!stage.set_scale("a", 0.0));
        assert!(!stage.set_scale("a", -2.0));
        assert_eq!(stage.scale("a"), Some(1.0));
        assert!(stage.set_scale("a", 2.0));
        assert_eq!(stage.scale("a"), Some(2.0));
    }

    #[test]
    fn set_parent_requires_existing_target() {
        let mut stage = stage_with("child", Node::default());
        assert!(!stage.set_parent("child", Some("ghost")));
        stage.add_node("parent", Node::default());
        assert!(stage.set_parent("child", Some("parent")));
        assert_eq!(stage.parent("child").as_deref(), Some("parent"));
        assert!(stage.set_parent("child", None));
        assert_eq!(stage.parent("child"), None);
    }

    #[test]
    fn rotation_pivots_about_origin() {
        let node = Node {
            origin: Point::new(5.0, 5.0),
            rotation: 90.0,
            ..Node::default()
        };
        let stage = stage_with("a", node);
        // The origin itself is fixed under rotation about it.
        let fixed = stage.map_to_scene("a", Point::new(5.0, 5.0)).unwrap();
        assert!((fixed - Point::new(5.0, 5.0)).hypot() < 1e-9);
        // A point right of the origin swings upward (y grows downward-free here).
        let moved = stage.map_to_scene("a", Point::new(6.0, 5.0)).unwrap();
        assert!((moved - Point::new(5.0, 6.0)).hypot() < 1e-9);
    }

    #[test]
    fn scene_transform_composes_parent_chain() {
        let mut stage = Stage::new();
        stage.add_node(
            "parent",
            Node {
                position: Point::new(100.0, 0.0),
                ..Node::default()
            },
        );
        stage.add_node(
            "child",
            Node {
                position: Point::new(10.0, 0.0),
                parent: Some("parent".to_string()),
                ..Node::default()
            },
        );
        let p = stage.map_to_scene("child", Point::ZERO).unwrap();
        assert!((p - Point::new(110.0, 0.0)).hypot() < 1e-9);

        let back = stage.map_from_scene("child", p).unwrap();
        assert!(back.to_vec2().hypot() < 1e-9);
    }

    #[test]
    fn map_roundtrip_with_rotation_and_scale() {
        let mut stage = Stage::new();
        stage.add_node(
            "n",
            Node {
                position: Point::new(3.0, 4.0),
                rotation: 37.0,
                scale: 1.5,
                origin: Point::new(2.0, 2.0),
                ..Node::default()
            },
        );
        let pt = Point::new(7.0, -1.0);
        let scene = stage.map_to_scene("n", pt).unwrap();
        let local = stage.map_from_scene("n", scene).unwrap();
        assert!((local - pt).hypot() < 1e-9);
    }
}
