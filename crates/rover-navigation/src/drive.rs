//! Point-to-point driving.
//!
//! [`Driver::drive_to`] turns "go to this transform" into one velocity
//! command per tick: rotate in place until the target bearing is within the
//! allowed deviation, then move forward with a speed that grows with distance
//! and shrinks with heading error, ramped so it never jumps by more than
//! `max_delta_speed` per tick.

use rover_geometry::{Transform, Twist, normalize_angle};

/// Tuning for [`Driver`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriveConfig {
    /// A target closer than this (m) counts as reached.
    pub arrival_distance: f64,
    /// Heading error (rad) accepted when the final rotation must match.
    pub rotation_tolerance: f64,
    /// Heading error (rad) under which the robot drives forward.
    pub linear_deviation: f64,
    /// Same as `linear_deviation` while avoiding an obstacle.
    pub avoid_linear_deviation: f64,
    /// Fixed in-place turn rate (rad/s) while avoiding an obstacle.
    pub avoid_turn_rate: f64,
    /// Speed cap (m/s).
    pub max_speed: f64,
    /// Speed floor when moving forward (m/s).
    pub min_speed: f64,
    /// Largest speed change between two commands (m/s).
    pub max_delta_speed: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            arrival_distance: 0.25,
            rotation_tolerance: 5f64.to_radians(),
            linear_deviation: 30f64.to_radians(),
            avoid_linear_deviation: 5f64.to_radians(),
            avoid_turn_rate: 30f64.to_radians(),
            max_speed: 0.5,
            min_speed: 0.1,
            max_delta_speed: 0.025,
        }
    }
}

/// Result of one driving step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drive {
    /// The target is reached; the previous command is left untouched.
    Arrived,
    /// Keep going with this command.
    Moving(Twist),
}

/// Stateful point-to-point driver. Remembers the last commanded speed so it
/// can ramp.
#[derive(Debug, Clone)]
pub struct Driver {
    config: DriveConfig,
    last_speed: f64,
}

impl Driver {
    /// A driver at rest.
    pub fn new(config: DriveConfig) -> Self {
        Driver { config, last_speed: 0.0 }
    }

    /// The tuning in use.
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Forgets the ramp state and returns a zero command.
    pub fn stop(&mut self) -> Twist {
        self.last_speed = 0.0;
        Twist::stop()
    }

    /// Records a command issued by someone else so the ramp continues from it.
    pub fn commanded(&mut self, twist: Twist) -> Twist {
        self.last_speed = twist.vx;
        twist
    }

    /// One step towards `target` from `location`.
    ///
    /// With `match_rotation`, arrival also requires the heading to be within
    /// the rotation tolerance of the target's yaw. With `avoiding`, forward
    /// motion needs a tighter heading and in-place turns use a fixed rate.
    pub fn drive_to(&mut self, location: &Transform, target: &Transform, match_rotation: bool, avoiding: bool) -> Drive {
        let cfg = &self.config;
        let dx = target.x() - location.x();
        let dy = target.y() - location.y();
        let distance = dx.hypot(dy);
        let mut delta = normalize_angle(dy.atan2(dx) - location.yaw());

        if distance < cfg.arrival_distance {
            if !match_rotation {
                return Drive::Arrived;
            }
            let final_delta = normalize_angle(target.yaw() - location.yaw());
            if final_delta.abs() < cfg.rotation_tolerance {
                return Drive::Arrived;
            }
            return Drive::Moving(self.commanded(Twist::new(0.0, final_delta)));
        }

        let max_deviation = if avoiding { cfg.avoid_linear_deviation } else { cfg.linear_deviation };
        if delta.abs() >= max_deviation {
            if avoiding {
                delta = delta.signum() * cfg.avoid_turn_rate;
            }
            return Drive::Moving(self.commanded(Twist::new(0.0, delta)));
        }

        let mut speed = (1.0 - (-5.0 * distance).exp()).min(cfg.max_speed);
        speed *= 1.0 - (delta / max_deviation).abs();
        speed = speed.max(cfg.min_speed);
        if (self.last_speed - speed).abs() > cfg.max_delta_speed {
            speed = if self.last_speed == 0.0 {
                cfg.max_delta_speed
            } else if speed > self.last_speed {
                self.last_speed + cfg.max_delta_speed
            } else {
                self.last_speed - cfg.max_delta_speed
            };
        }
        Drive::Moving(self.commanded(Twist::new(speed, delta)))
    }
}
