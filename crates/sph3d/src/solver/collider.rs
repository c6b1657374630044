//! Collision resolution hook.

use glam::Vec3;

/// Pushes penetrating particles back to a legal position and responds to
/// their velocity. Implementations must be callable from parallel lanes.
pub trait Collider: Send + Sync {
    fn resolve(&self, restitution: f32, position: &mut Vec3, velocity: &mut Vec3);
}

/// Axis-aligned box of solid walls enclosing the fluid.
#[derive(Clone, Copy, Debug)]
pub struct BoxCollider {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl BoxCollider {
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        assert!(
            lower.x <= upper.x && lower.y <= upper.y && lower.z <= upper.z,
            "box collider bounds are inverted: {:?} .. {:?}",
            lower,
            upper
        );
        Self { lower, upper }
    }
}

impl Collider for BoxCollider {
    fn resolve(&self, restitution: f32, position: &mut Vec3, velocity: &mut Vec3) {
        // Per-axis clamp; only approaching velocity components reflect, so a
        // particle already separating from a wall is left alone.
        if position.x < self.lower.x {
            position.x = self.lower.x;
            if velocity.x < 0.0 {
                velocity.x = -velocity.x * restitution;
            }
        } else if position.x > self.upper.x {
            position.x = self.upper.x;
            if velocity.x > 0.0 {
                velocity.x = -velocity.x * restitution;
            }
        }
        if position.y < self.lower.y {
            position.y = self.lower.y;
            if velocity.y < 0.0 {
                velocity.y = -velocity.y * restitution;
            }
        } else if position.y > self.upper.y {
            position.y = self.upper.y;
            if velocity.y > 0.0 {
                velocity.y = -velocity.y * restitution;
            }
        }
        if position.z < self.lower.z {
            position.z = self.lower.z;
            if velocity.z < 0.0 {
                velocity.z = -velocity.z * restitution;
            }
        } else if position.z > self.upper.z {
            position.z = self.upper.z;
            if velocity.z > 0.0 {
                velocity.z = -velocity.z * restitution;
            }
        }
    }
}
