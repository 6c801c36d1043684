//! Poses and direction math.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Squared length below which a direction is treated as degenerate.
const DEGENERATE_LENGTH_SQUARED: f32 = 1.0e-12;

/// A rigid transform: position plus orientation, in world space unless
/// stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// A pose from a position and rotation.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// A pose at `position` with no rotation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Rotate a direction from this pose's local frame into the parent frame.
    pub fn transform_direction(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// Compose `self * local`: the pose `local` expressed in this pose's
    /// frame, returned in the parent frame.
    pub fn compose(&self, local: Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * local.position,
            rotation: self.rotation * local.rotation,
        }
    }

    /// The pose that undoes this one.
    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.inverse();
        Pose {
            position: -(rotation * self.position),
            rotation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Unsigned angle between two directions in degrees, in `[0, 180]`.
///
/// Returns NaN when either direction is degenerate, so that any `<=`
/// comparison against a threshold fails.
pub fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    let denominator = (a.length_squared() * b.length_squared()).sqrt();
    if denominator < DEGENERATE_LENGTH_SQUARED {
        return f32::NAN;
    }
    (a.dot(b) / denominator).clamp(-1.0, 1.0).acos().to_degrees()
}
