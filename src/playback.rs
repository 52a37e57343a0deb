//! Playback controller: one-frame ticks over the scene range and keyframe
//! -aware navigation.
//!
//! Moving off a frame that holds a keyframe re-captures the live scene
//! state into it first, so edits made while parked on a keyframe are never
//! silently lost.

use crate::{
    applier::apply_frame,
    core::{FrameIndex, next_playback_frame},
    scene::SceneModel,
    stage::NodeStage,
};

/// Drives the current-frame pointer and keeps the stage in sync.
#[derive(Clone, Copy, Debug, Default)]
pub struct Playback {
    pub loop_enabled: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn looping(loop_enabled: bool) -> Self {
        Self { loop_enabled }
    }

    /// Jump to `index` and apply its resolved state to the stage.
    ///
    /// If the departed frame holds a keyframe, the live scene state is
    /// captured back into it before moving.
    pub fn go_to_frame(&self, model: &mut SceneModel, stage: &mut dyn NodeStage, index: FrameIndex) {
        let departed = model.current_frame;
        if index != departed && model.keyframes.contains_key(&departed) {
            let snapshot = model.capture_scene_state();
            model.add_keyframe(departed, snapshot);
        }
        model.go_to_frame(index);
        apply_frame(model, stage);
    }

    /// Advance one frame. Returns `false` when playback hit the end of the
    /// range without looping; the current frame is left in place then.
    pub fn next_frame(&self, model: &mut SceneModel, stage: &mut dyn NodeStage) -> bool {
        let (next, stopped) = next_playback_frame(
            model.current_frame,
            model.start_frame,
            model.end_frame,
            self.loop_enabled,
        );
        if stopped {
            return false;
        }
        self.go_to_frame(model, stage, next);
        true
    }

    /// Rewind to the start of the range and apply it.
    pub fn stop(&self, model: &mut SceneModel, stage: &mut dyn NodeStage) {
        let start = model.start_frame;
        self.go_to_frame(model, stage, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ObjectKind, SceneObject};
    use crate::stage::Stage;

    fn setup() -> (SceneModel, Stage) {
        let mut model = SceneModel::new();
        model.add_object(SceneObject::new("rock", ObjectKind::Svg, "rock.svg").at(10.0, 20.0));
        model.add_keyframe(FrameIndex(0), model.capture_scene_state());
        model.set_range(FrameIndex(0), FrameIndex(10));
        (model, Stage::new())
    }

    #[test]
    fn next_frame_advances_and_applies() {
        let (mut model, mut stage) = setup();
        let playback = Playback::new();
        assert!(playback.next_frame(&mut model, &mut stage));
        assert_eq!(model.current_frame, FrameIndex(1));
        // The applier materialized the object node from the keyframe.
        assert!(stage.contains("rock"));
    }

    #[test]
    fn next_frame_stops_at_end_without_loop() {
        let (mut model, mut stage) = setup();
        let playback = Playback::new();
        model.go_to_frame(FrameIndex(10));
        assert!(!playback.next_frame(&mut model, &mut stage));
        assert_eq!(model.current_frame, FrameIndex(10));
    }

    #[test]
    fn next_frame_loops_back_to_start() {
        let (mut model, mut stage) = setup();
        let playback = Playback::looping(true);
        model.go_to_frame(FrameIndex(10));
        assert!(playback.next_frame(&mut model, &mut stage));
        assert_eq!(model.current_frame, FrameIndex(0));
    }

    #[test]
    fn leaving_a_keyframe_captures_live_edits() {
        let (mut model, mut stage) = setup();
        let playback = Playback::new();
        // Edit while parked on the frame-0 keyframe.
        model.objects.get_mut("rock").unwrap().x = 99.0;

        playback.go_to_frame(&mut model, &mut stage, FrameIndex(5));
        assert_eq!(model.keyframes[&FrameIndex(0)].objects["rock"].x, 99.0);
        // Frame 5 resolves from the updated keyframe.
        assert_eq!(stage.position("rock").unwrap().x, 99.0);
    }

    #[test]
    fn jumping_to_the_same_frame_does_not_recapture() {
        let (mut model, mut stage) = setup();
        let playback = Playback::new();
        model.objects.get_mut("rock").unwrap().x = 99.0;
        playback.go_to_frame(&mut model, &mut stage, FrameIndex(0));
        // Still the originally captured value.
        assert_eq!(model.keyframes[&FrameIndex(0)].objects["rock"].x, 10.0);
    }

    #[test]
    fn stop_rewinds_to_range_start() {
        let (mut model, mut stage) = setup();
        let playback = Playback::new();
        model.set_range(FrameIndex(2), FrameIndex(10));
        model.go_to_frame(FrameIndex(7));
        playback.stop(&mut model, &mut stage);
        assert_eq!(model.current_frame, FrameIndex(2));
    }
}
