use kurbo::Affine;

pub use kurbo::{Point, Rect, Vec2};

/// Timeline position in whole frames. Signed so prev/next deltas and
/// interpolation ratios stay in one arithmetic domain.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct FrameIndex(pub i64);

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Clamp `value` into the inclusive range [lo, hi].
///
/// An inverted range (lo > hi) returns `value` unchanged.
pub fn clamp_frame(value: FrameIndex, lo: FrameIndex, hi: FrameIndex) -> FrameIndex {
    if lo.0 > hi.0 {
        return value;
    }
    FrameIndex(value.0.clamp(lo.0, hi.0))
}

/// Compute the next playback frame for a one-frame tick.
///
/// Returns `(next_index, should_stop)`. When the candidate frame runs past
/// `end`: loop back to `start` if looping, otherwise stay put and stop.
/// An inverted range is normalized by swapping the bounds.
pub fn next_playback_frame(
    current: FrameIndex,
    start: FrameIndex,
    end: FrameIndex,
    loop_enabled: bool,
) -> (FrameIndex, bool) {
    let (start, end) = if end.0 < start.0 {
        (end, start)
    } else {
        (start, end)
    };
    let candidate = FrameIndex(current.0 + 1);
    if candidate.0 > end.0 {
        if loop_enabled {
            return (start, false);
        }
        return (current, true);
    }
    (candidate, false)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Interpolate angles in degrees along the shortest arc.
///
/// The delta is wrapped to [-180, 180] so a sweep crossing the 0/360
/// boundary takes the short way around.
pub fn lerp_angle(a: f64, b: f64, t: f64) -> f64 {
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    a + delta * t
}

/// Rotation/scale components recovered from an affine transform.
///
/// Rotation comes from the first basis vector (`atan2`), scale magnitudes
/// from the basis-vector lengths. Translation is read off the affine
/// directly where needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineParts {
    pub rotation_deg: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl AffineParts {
    pub fn decompose(affine: Affine) -> Self {
        let [a, b, c, d, _, _] = affine.as_coeffs();
        let scale_x = a.hypot(b);
        let y_len = c.hypot(d);
        // Degenerate second basis vector: fall back to the first.
        let scale_y = if y_len > 0.0 { y_len } else { scale_x };
        Self {
            rotation_deg: b.atan2(a).to_degrees(),
            scale_x,
            scale_y,
        }
    }

    /// Single scale factor for uniform-scale nodes.
    pub fn uniform_scale(&self) -> f64 {
        if self.scale_y > 0.0 {
            (self.scale_x + self.scale_y) * 0.5
        } else {
            self.scale_x
        }
    }
}

/// Rotate a vector by an angle in degrees.
pub fn rotate_vec(v: Vec2, angle_deg: f64) -> Vec2 {
    let rad = angle_deg.to_radians();
    let (sin, cos) = rad.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}
