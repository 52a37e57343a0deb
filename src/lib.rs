//! Pantin is a 2D stop-motion puppet animation engine.
//!
//! The core is a keyframed scene model driven through a small set of
//! synchronous operations:
//!
//! - Build a [`Rig`] from a structural asset and place it in a [`SceneModel`]
//! - Edit poses and objects, capture them into keyframes
//! - Resolve any frame's effective state with the applier and push it to a
//!   presentation layer through [`NodeStage`]
#![forbid(unsafe_code)]

pub mod applier;
pub mod convert;
pub mod core;
pub mod doc;
pub mod error;
pub mod naming;
pub mod playback;
pub mod rig;
pub mod scene;
pub mod services;
pub mod stage;

pub use crate::core::{AffineParts, FrameIndex, lerp, lerp_angle, next_playback_frame};
pub use error::{PantinError, PantinResult};
pub use rig::{MemberId, PuppetPose, Rig, RigMember, RigSource};
pub use scene::{Keyframe, SceneModel, SceneObject, SceneSnapshot};
pub use stage::{NodeStage, Stage};
