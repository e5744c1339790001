//! 2D Transform Math
//!
//! A transform places an entity's local frame in the scene: the origin is
//! the entity center, rotation is in degrees and scale is uniform.
//!
//! local → scene: scale, then rotate, then translate to (x, y).

use macroquad::math::Vec2;
use crate::project::Transform;

/// Rotate a vector by an angle in degrees
pub fn rotate_deg(v: Vec2, degrees: f32) -> Vec2 {
    if degrees == 0.0 {
        return v;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Scene-space helpers for the component data
pub trait Transform2d {
    fn center(&self) -> Vec2;
    /// Scaled width and height
    fn size(&self) -> Vec2;
    fn to_world(&self, local: Vec2) -> Vec2;
    fn to_local(&self, world: Vec2) -> Vec2;
    /// Whether a scene point lies inside the entity's rotated, scaled bounds
    fn contains(&self, world: Vec2) -> bool;
}

impl Transform2d for Transform {
    fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.w * self.scale, self.h * self.scale)
    }

    fn to_world(&self, local: Vec2) -> Vec2 {
        rotate_deg(local * self.scale, self.rotation) + self.center()
    }

    fn to_local(&self, world: Vec2) -> Vec2 {
        let unrotated = rotate_deg(world - self.center(), -self.rotation);
        if self.scale == 0.0 {
            unrotated
        } else {
            unrotated / self.scale
        }
    }

    fn contains(&self, world: Vec2) -> bool {
        let local = rotate_deg(world - self.center(), -self.rotation);
        let half = self.size() * 0.5;
        local.x.abs() <= half.x.abs() && local.y.abs() <= half.y.abs()
    }
}
