//! Timestamped rigid transforms.
//!
//! A [`Transform`] is a 3-D position plus a unit quaternion orientation and the
//! time (seconds) at which it was observed. Navigation only ever looks at the
//! planar part (x, y, yaw), but composition is done in full 3-D so that poses
//! coming from a localization stack survive a round trip unchanged.

use core::fmt;
use libm::{atan2, cos, sin, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// A unit quaternion `(x, y, z, w)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// i component.
    pub x: f64,
    /// j component.
    pub y: f64,
    /// k component.
    pub z: f64,
    /// Real component.
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Build a normalized quaternion from raw components.
    ///
    /// # Errors
    ///
    /// Returns `Err(GeometryError::InvalidRotation)` if the norm is zero or not finite.
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Result<Self, GeometryError> {
        let norm = sqrt(x * x + y * y + z * z + w * w);
        if !norm.is_finite() || norm == 0.0 {
            return Err(GeometryError::InvalidRotation("quaternion norm must be non-zero"));
        }
        Ok(Quaternion { x: x / norm, y: y / norm, z: z / norm, w: w / norm })
    }

    /// Rotation of `yaw` radians about the z axis.
    pub fn from_yaw(yaw: f64) -> Self {
        Quaternion { x: 0.0, y: 0.0, z: sin(yaw / 2.0), w: cos(yaw / 2.0) }
    }

    /// Hamilton product `self * other`.
    pub fn mul(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    /// Inverse of a unit quaternion.
    pub fn conjugate(&self) -> Quaternion {
        Quaternion { x: -self.x, y: -self.y, z: -self.z, w: self.w }
    }

    /// Rotate a vector by this quaternion.
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let p = Quaternion { x: v[0], y: v[1], z: v[2], w: 0.0 };
        let r = self.mul(&p).mul(&self.conjugate());
        [r.x, r.y, r.z]
    }

    /// Rotation about the z axis, in `(-PI, PI]`.
    pub fn yaw(&self) -> f64 {
        atan2(
            2.0 * (self.w * self.z + self.x * self.y),
            1.0 - 2.0 * (self.y * self.y + self.z * self.z),
        )
    }
}

/// A 3-D pose with a timestamp. Immutable once built.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    position: [f64; 3],
    rotation: Quaternion,
    timestamp: f64,
}

impl Transform {
    /// Construct a transform from a position and a yaw angle, at time zero.
    ///
    /// # Arguments
    ///
    /// * `x`, `y`, `z`: Position in meters.
    /// * `yaw`: Rotation about the z axis in radians.
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Transform { position: [x, y, z], rotation: Quaternion::from_yaw(yaw), timestamp: 0.0 }
    }

    /// Construct a transform from its raw parts.
    pub fn from_parts(position: [f64; 3], rotation: Quaternion, timestamp: f64) -> Self {
        Transform { position, rotation, timestamp }
    }

    /// Return a copy stamped with `timestamp` seconds.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// World-frame x position (m).
    pub fn x(&self) -> f64 {
        self.position[0]
    }

    /// World-frame y position (m).
    pub fn y(&self) -> f64 {
        self.position[1]
    }

    /// World-frame z position (m).
    pub fn z(&self) -> f64 {
        self.position[2]
    }

    /// Position vector.
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Orientation quaternion.
    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    /// Observation time in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Heading about the z axis (rad).
    pub fn yaw(&self) -> f64 {
        self.rotation.yaw()
    }

    /// Compose `self ∘ other`: `other` is expressed in the frame of `self`.
    ///
    /// The result keeps the timestamp of `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_geometry::Transform;
    /// use core::f64::consts::FRAC_PI_2;
    ///
    /// let robot = Transform::new(1.0, 1.0, 0.0, FRAC_PI_2);
    /// let ahead = robot.compose(&Transform::new(1.0, 0.0, 0.0, 0.0));
    /// assert!((ahead.x() - 1.0).abs() < 1e-9);
    /// assert!((ahead.y() - 2.0).abs() < 1e-9);
    /// ```
    pub fn compose(&self, other: &Transform) -> Transform {
        let r = self.rotation.rotate(other.position);
        Transform {
            position: [
                self.position[0] + r[0],
                self.position[1] + r[1],
                self.position[2] + r[2],
            ],
            rotation: self.rotation.mul(&other.rotation),
            timestamp: self.timestamp,
        }
    }

    /// The inverse transform, so that `t.compose(&t.inverse())` is the identity.
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        let p = rotation.rotate(self.position);
        Transform { position: [-p[0], -p[1], -p[2]], rotation, timestamp: self.timestamp }
    }

    /// Squared distance in the x/y plane.
    pub fn planar_distance_to_squared(&self, other: &Transform) -> f64 {
        let dx = self.position[0] - other.position[0];
        let dy = self.position[1] - other.position[1];
        dx * dx + dy * dy
    }

    /// Distance in the x/y plane.
    pub fn planar_distance_to(&self, other: &Transform) -> f64 {
        sqrt(self.planar_distance_to_squared(other))
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.2}, y: {:.2}, z: {:.2}, yaw: {:.2} rad, t: {:.3})",
            self.position[0],
            self.position[1],
            self.position[2],
            self.yaw(),
            self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_yaw_round_trip() {
        for yaw in [0.0, 0.3, FRAC_PI_2, -2.0, PI - 1e-6] {
            let tf = Transform::new(0.0, 0.0, 0.0, yaw);
            assert!((tf.yaw() - yaw).abs() < 1e-6, "yaw {}", yaw);
        }
    }

    #[test]
    fn test_compose_rotates_offset() {
        let base = Transform::new(2.0, 0.0, 0.0, FRAC_PI_2).with_timestamp(4.0);
        let left = base.compose(&Transform::new(0.0, 0.25, 0.0, 0.0));
        assert!((left.x() - 1.75).abs() < EPSILON);
        assert!((left.y() - 0.0).abs() < EPSILON);
        assert!((left.yaw() - FRAC_PI_2).abs() < EPSILON);
        assert_eq!(left.timestamp(), 4.0);
    }

    #[test]
    fn test_inverse_is_identity() {
        let tf = Transform::new(1.5, -2.0, 0.3, 0.7);
        let id = tf.compose(&tf.inverse());
        assert!(id.x().abs() < EPSILON);
        assert!(id.y().abs() < EPSILON);
        assert!(id.z().abs() < EPSILON);
        assert!(id.yaw().abs() < EPSILON);
    }

    #[test]
    fn test_planar_distance_ignores_z() {
        let a = Transform::new(0.0, 0.0, 0.0, 0.0);
        let b = Transform::new(3.0, 4.0, 10.0, 1.0);
        assert!((a.planar_distance_to(&b) - 5.0).abs() < EPSILON);
        assert!((a.planar_distance_to_squared(&b) - 25.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        let result = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(result, Err(GeometryError::InvalidRotation(_))));
    }
}
