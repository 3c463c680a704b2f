//! Smoothing of remote peer motion between snapshots.

use shared::Vec3;

/// Moves `current` a fixed fraction of the way to `target`.
///
/// Applied once per tick this is an exponential approach: the remaining gap
/// shrinks by `1 - blend` each step and never closes exactly. There is no
/// extrapolation; with no new snapshot the peer settles on its last target.
pub fn blend_towards(current: Vec3, target: Vec3, blend: f32) -> Vec3 {
    current + (target - current) * blend
}
