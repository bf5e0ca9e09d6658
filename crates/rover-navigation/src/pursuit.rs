//! Pure-pursuit path tracking.
//!
//! The controller aims at the next point of a path and returns the signed
//! curvature of the arc that brings the robot onto the segment heading
//! towards the point after it. Curvature is positive for a right turn.

use rover_geometry::{Transform, Twist, normalize_angle};
use tracing::debug;

use crate::error::NavigationError;
use crate::map::CostMapPose;
use crate::path::Path;

// A segment heading at or behind this cosine needs no correction.
const ALIGNED_COS: f64 = -1e-9;

/// Tuning for [`PursuitVelocityGenerator`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PursuitConfig {
    /// How far ahead on the path the controller aims (m).
    pub lookahead: f64,
    /// Linear speed cap (m/s).
    pub max_linear: f64,
    /// Angular speed cap (rad/s).
    pub max_angular: f64,
    /// On the last segment, linear speed scales with the remaining distance
    /// up to this many meters.
    pub max_node_distance: f64,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self { lookahead: 0.5, max_linear: 0.5, max_angular: 1.0, max_node_distance: 1.0 }
    }
}

/// Curvature computation with a fixed lookahead distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurePursuit {
    lookahead: f64,
}

impl PurePursuit {
    /// Creates a controller. The lookahead must be positive and finite.
    pub fn new(lookahead: f64) -> Result<Self, NavigationError> {
        if !(lookahead > 0.0 && lookahead.is_finite()) {
            return Err(NavigationError::InvalidParameter("Lookahead distance must be positive"));
        }
        Ok(PurePursuit { lookahead })
    }

    /// The lookahead distance (m).
    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// True once `next` is within the lookahead of `pose`, meaning the
    /// tracker should move on to the following point.
    pub fn should_move(&self, pose: &Transform, next: (f64, f64)) -> bool {
        (next.0 - pose.x()).hypot(next.1 - pose.y()) <= self.lookahead
    }

    /// Signed curvature (1/m) to reach `p2` from `pose`, oriented by the
    /// `p1 -> p2` segment. Positive turns right, negative turns left, zero
    /// goes straight.
    ///
    /// ```
    /// use rover_geometry::Transform;
    /// use rover_navigation::pursuit::PurePursuit;
    ///
    /// let pp = PurePursuit::new(0.5).unwrap();
    /// let kappa = pp.compute_curvature_to_reach(&Transform::new(0.0, 0.0, 0.0, 0.0), (10.0, 0.0), (0.0, 10.0));
    /// assert!((kappa + 0.2828).abs() < 1e-3);
    /// ```
    pub fn compute_curvature_to_reach(&self, pose: &Transform, p1: (f64, f64), p2: (f64, f64)) -> f64 {
        let to_target = (p2.0 - pose.x(), p2.1 - pose.y());
        let target_distance = to_target.0.hypot(to_target.1);
        let mut segment = (p2.0 - p1.0, p2.1 - p1.1);
        if segment.0.hypot(segment.1) < f64::EPSILON {
            if target_distance < f64::EPSILON {
                return 0.0;
            }
            segment = to_target;
        }

        let error = normalize_angle(segment.1.atan2(segment.0) - pose.yaw());
        let cos_error = error.cos();
        if cos_error > ALIGNED_COS {
            return 0.0;
        }
        let arc = (target_distance / 2.0).max(self.lookahead);
        -error.signum() * 2.0 * (-cos_error) / arc
    }
}

/// Turns a grid path into velocity commands with [`PurePursuit`].
///
/// Cells are tracked through their world-space centers. The head of the
/// path is dropped once the robot is within the lookahead of it, as long as
/// at least two points remain.
#[derive(Debug, Clone)]
pub struct PursuitVelocityGenerator {
    config: PursuitConfig,
    pursuit: PurePursuit,
    points: Vec<(f64, f64)>,
}

impl PursuitVelocityGenerator {
    /// Creates a generator with no path.
    pub fn new(config: PursuitConfig) -> Result<Self, NavigationError> {
        if !(config.max_angular > 0.0) {
            return Err(NavigationError::InvalidParameter("Max angular speed must be positive"));
        }
        if !(config.max_node_distance > 0.0) {
            return Err(NavigationError::InvalidParameter("Max node distance must be positive"));
        }
        let pursuit = PurePursuit::new(config.lookahead)?;
        Ok(PursuitVelocityGenerator { config, pursuit, points: Vec::new() })
    }

    /// Replaces the tracked path.
    pub fn set_path(&mut self, path: &Path<CostMapPose>) {
        self.points = path.iter().map(CostMapPose::world_xy).collect();
    }

    /// Points still to be tracked, in world units.
    pub fn remaining(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Command for the robot at `pose`, or `None` when fewer than two points
    /// remain.
    pub fn compute_velocity(&mut self, pose: &Transform) -> Option<Twist> {
        if self.points.len() < 2 {
            return None;
        }
        let goal = self.points[0];
        let helper = self.points[1];
        let remaining = self.points.len();
        let advance = self.pursuit.should_move(pose, goal) && remaining > 2;
        let kappa = self.pursuit.compute_curvature_to_reach(pose, goal, helper);
        if advance {
            self.points.remove(0);
        }
        debug!(goal = ?goal, helper = ?helper, advance, remaining, kappa, "Pursuit update");

        let max_angular = self.config.max_angular;
        let angular = (-kappa).clamp(-max_angular, max_angular);
        let linear = if remaining <= 2 {
            let distance = (goal.0 - pose.x()).hypot(goal.1 - pose.y());
            self.config.max_linear * distance.min(self.config.max_node_distance) / self.config.max_node_distance
        } else {
            self.config.max_linear * (1.0 - angular.abs() / max_angular)
        };
        Some(Twist::new(linear, angular))
    }
}
