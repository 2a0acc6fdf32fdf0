//! Shared building blocks used by more than one mode simulation (spec §3:
//! Input Vector; spec §4.5.1: Smash reuses Arena's knockback math).

use serde::{Deserialize, Serialize};

/// A 2D vector. Arena and Smash both use a ground-plane position
/// (`x`, `z`) plus a separate vertical axis handled inline — keeping this
/// 2D rather than 3D matches how both modes actually consume it (Arena's
/// ring is a top-down plane, Smash's stage is a side view).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len < f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn scale(&self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn add(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        self.sub(other).length()
    }

    /// A unit vector pointing along `angle` radians (0 = +x axis).
    pub fn from_angle(angle: f32) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }
}

/// The latest authoritative per-tick movement intent (spec §3 Input
/// Vector). One-shot actions are modeled as separate `ClientMessage`
/// variants per mode rather than queued on this struct, since `GameLogic`
/// already hands each mode its own typed message enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InputVector {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub run: bool,
    pub jump: bool,
    pub block: bool,
}

impl InputVector {
    /// The movement axis implied by left/right/up/down, as a unit-ish
    /// vector (not normalized — diagonals are slightly faster, matching
    /// the simplicity of a typical top-down/platformer movement scheme).
    pub fn movement_axis(&self) -> Vec2 {
        let mut v = Vec2::ZERO;
        if self.left {
            v.x -= 1.0;
        }
        if self.right {
            v.x += 1.0;
        }
        if self.up {
            v.y += 1.0;
        }
        if self.down {
            v.y -= 1.0;
        }
        v
    }
}

/// Computes knockback-scaled damage the way Smash does it: the base
/// knockback grows with the target's accumulated damage percent, unlike
/// Arena's flat per-strike knockback. Shared here so Smash doesn't
/// reimplement Arena's vector math, only the scaling curve.
pub fn scaled_knockback(base_knockback: Vec2, damage_percent: f32, scale: f32) -> Vec2 {
    let factor = 1.0 + damage_percent * scale;
    base_knockback.scale(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_normalized_zero_vector_stays_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_input_vector_movement_axis_combines_directions() {
        let input = InputVector {
            right: true,
            up: true,
            ..Default::default()
        };
        let axis = input.movement_axis();
        assert_eq!(axis, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_scaled_knockback_grows_with_damage() {
        let base = Vec2::new(1.0, 0.0);
        let low = scaled_knockback(base, 0.0, 0.02);
        let high = scaled_knockback(base, 100.0, 0.02);
        assert!(high.x > low.x);
    }
}
