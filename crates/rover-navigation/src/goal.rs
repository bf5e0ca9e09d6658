//! Goal intake: turning high-level goals into drive points and tracking a
//! drive point through the follower.

use std::time::Instant;

use rand::Rng;
use rover_geometry::{Transform, Twist};
use tracing::{debug, info};

use crate::action::{GoalAction, GoalPointState};
use crate::follower::{PathFollower, PathFollowerState};
use crate::world::World;

/// Patrol points are picked within this distance (m) of the patrol target.
pub const PATROL_DISTANCE: f64 = 3.0;

/// Where a goal points to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalTarget {
    /// An explicit transform.
    Location(Transform),
    /// A named point of interest, looked up in the world.
    PointOfInterest(String),
}

impl GoalTarget {
    /// Resolves the target against `world`.
    pub fn resolve(&self, world: &World) -> Option<Transform> {
        match self {
            GoalTarget::Location(tf) => Some(*tf),
            GoalTarget::PointOfInterest(name) => world.point_of_interest(name).copied(),
        }
    }
}

/// What a processor wants done next.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalDecision {
    /// Drive to `location` and then perform `action`.
    Drive {
        /// Goal transform.
        location: Transform,
        /// Action at the goal.
        action: GoalAction,
    },
    /// Drop the goal.
    Reject,
    /// Step aside for another goal.
    Preempt,
}

/// A high-level goal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalProcessor {
    /// Drive to a point.
    DrivePoint {
        /// Where to go.
        target: GoalTarget,
        /// What to do there.
        action: GoalAction,
    },
    /// Drive to a random point of interest or waypoint.
    RandomDriver,
    /// Drive to a random waypoint near a target.
    PatrolDriver {
        /// Center of the patrol area.
        around: GoalTarget,
    },
}

fn pick<R: Rng + ?Sized>(rng: &mut R, candidates: &[Transform]) -> Option<Transform> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.random_range(0..candidates.len())])
}

impl GoalProcessor {
    /// Decides the next step of this goal. Cancellation wins over
    /// preemption.
    pub fn process<R: Rng + ?Sized>(&self, world: &World, rng: &mut R, cancel: bool, preempt: bool) -> GoalDecision {
        if cancel {
            return GoalDecision::Reject;
        }
        if preempt {
            return GoalDecision::Preempt;
        }
        let decision = match self {
            GoalProcessor::DrivePoint { target, action } => target
                .resolve(world)
                .map(|location| GoalDecision::Drive { location, action: action.clone() }),
            GoalProcessor::RandomDriver => {
                let pois: Vec<Transform> = world.points_of_interest.iter().map(|p| p.location).collect();
                pick(rng, &pois)
                    .or_else(|| pick(rng, &world.custom_transforms))
                    .or_else(|| pick(rng, &world.smoothed_transforms))
                    .map(|location| GoalDecision::Drive { location, action: GoalAction::NoAction })
            }
            GoalProcessor::PatrolDriver { around } => around.resolve(world).and_then(|center| {
                let limit = PATROL_DISTANCE * PATROL_DISTANCE;
                let nearby: Vec<Transform> = world
                    .waypoints()
                    .iter()
                    .filter(|tf| tf.planar_distance_to_squared(&center) < limit)
                    .copied()
                    .collect();
                debug!(candidates = nearby.len(), "Patrol candidates");
                pick(rng, &nearby).map(|location| GoalDecision::Drive { location, action: GoalAction::NoAction })
            }),
        };
        decision.unwrap_or(GoalDecision::Reject)
    }
}

/// Tracks one drive point through a [`PathFollower`] and reports it with
/// the goal-point lifecycle.
#[derive(Debug)]
pub struct GoalPointFollower {
    follower: PathFollower,
    pending: Option<(Option<Transform>, GoalAction)>,
    state: Option<GoalPointState>,
}

impl GoalPointFollower {
    /// Wraps a follower.
    pub fn new(follower: PathFollower) -> Self {
        GoalPointFollower { follower, pending: None, state: None }
    }

    /// The wrapped follower.
    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    /// The wrapped follower, mutably.
    pub fn follower_mut(&mut self) -> &mut PathFollower {
        &mut self.follower
    }

    /// Lifecycle of the current goal point, if one was submitted.
    pub fn goal_state(&self) -> Option<GoalPointState> {
        self.state
    }

    /// Submits a goal point. It is handed to the follower on the next tick.
    pub fn submit(&mut self, goal: Option<Transform>, action: GoalAction) {
        self.pending = Some((goal, action));
        self.state = Some(GoalPointState::New);
    }

    /// Drops the current goal point.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.follower.clear_goal();
        if self.state == Some(GoalPointState::Running) || self.state == Some(GoalPointState::New) {
            self.state = Some(GoalPointState::Rejected);
        }
    }

    /// Runs one follower tick, handing over a new goal first if there is one.
    pub fn on_update(&mut self, location: &Transform, blocked: bool, now: Instant) -> Twist {
        if let Some((goal, action)) = self.pending.take() {
            self.follower.set_goal(goal, action, now);
            self.state = Some(GoalPointState::Running);
        }
        let twist = self.follower.on_update(location, blocked, now);
        if self.state == Some(GoalPointState::Running) {
            match self.follower.state() {
                PathFollowerState::NoGoal => {
                    info!("Goal point completed");
                    self.state = Some(GoalPointState::Completed);
                }
                PathFollowerState::RejectGoal(reason) => {
                    info!(%reason, "Goal point rejected");
                    self.state = Some(GoalPointState::Rejected);
                }
                _ => {}
            }
        }
        twist
    }
}
