//! Kinematics on the toroidal arena
//!
//! No drag, no dt scaling: one tick moves an entity by exactly its velocity.

use crate::game::constants::entity::MAX_SPEED;
use crate::game::world::WorldBounds;
use crate::util::vec2::Vec2;

/// Strictly below MAX_SPEED (compared squared, no sqrt)
#[inline]
pub fn within_speed_limit(velocity: Vec2) -> bool {
    velocity.length_sq() < MAX_SPEED * MAX_SPEED
}

/// Wraps one coordinate into `[0, span)`.
///
/// Simple boundary crossings (less than one span past an edge) are shifted
/// by one span; anything further falls back to a euclidean remainder so a
/// single huge step still lands inside.
pub fn wrap_axis(value: f32, span: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    if value >= 0.0 && value < span {
        return value;
    }

    let wrapped = if value >= span && value < span * 2.0 {
        value - span
    } else if value < 0.0 && value >= -span {
        value + span
    } else {
        value.rem_euclid(span)
    };

    // e.g. -1e-6 + 800.0 rounds up to 800.0 in f32
    if wrapped >= span || wrapped < 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wraps both axes independently
pub fn wrap_position(position: Vec2, world: &WorldBounds) -> Vec2 {
    Vec2::new(
        wrap_axis(position.x, world.width),
        wrap_axis(position.y, world.height),
    )
}

/// Integrate one tick and wrap
pub fn advance(position: Vec2, velocity: Vec2, world: &WorldBounds) -> Vec2 {
    wrap_position(position + velocity, world)
}
