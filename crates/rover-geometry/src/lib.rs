#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library of planar robot geometry."]
#![doc = ""]
#![doc = "This crate provides timestamped transforms, velocity commands, angle"]
#![doc = "wrapping and unicycle pose integration used by the navigation stack."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod transform;

pub use error::GeometryError;
pub use transform::{Quaternion, Transform};

/// Wrap an angle into `[-PI, PI)`.
///
/// Angles at `PI` are wrapped to `-PI`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}

/// A velocity command expressed in the robot base frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    /// Linear x velocity (m/s).
    pub vx: f64,
    /// Angular z velocity (rad/s), positive counter-clockwise.
    pub wz: f64,
}

impl Twist {
    /// Construct a new twist.
    ///
    /// # Arguments
    ///
    /// * `vx`: Linear velocity along the robot's x-axis (m/s).
    /// * `wz`: Angular velocity around the robot's z-axis (rad/s).
    pub const fn new(vx: f64, wz: f64) -> Self {
        Twist { vx, wz }
    }

    /// The all-zero command.
    pub const fn stop() -> Self {
        Twist { vx: 0.0, wz: 0.0 }
    }
}

impl fmt::Display for Twist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(vx: {:.2} m/s, ωz: {:.2} rad/s)", self.vx, self.wz)
    }
}

/// Advance `pose` by applying `twist` for `dt` seconds (unicycle model).
///
/// Height and the timestamp offset are carried over; the resulting timestamp
/// is `pose.timestamp() + dt`.
///
/// # Errors
///
/// Returns `Err(GeometryError::NegativeTimeDelta)` if `dt` is negative.
pub fn integrate(pose: &Transform, twist: &Twist, dt: f64) -> Result<Transform, GeometryError> {
    if dt < 0.0 {
        return Err(GeometryError::NegativeTimeDelta("must be non-negative"));
    }
    let yaw = pose.yaw();
    let x = pose.x() + twist.vx * cos(yaw) * dt;
    let y = pose.y() + twist.vx * sin(yaw) * dt;
    let yaw = normalize_angle(yaw + twist.wz * dt);
    Ok(Transform::new(x, y, pose.z(), yaw).with_timestamp(pose.timestamp() + dt))
}
