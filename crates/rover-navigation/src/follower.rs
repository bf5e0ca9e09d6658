//! Goal following over the waypoint graph.
//!
//! [`PathFollower`] owns one goal at a time and is ticked by the control loop
//! with the robot's location. Each tick it (re)plans over the [`NodeGraph`]
//! when needed, drives node to node, sidesteps obstacles when allowed and
//! finally performs the goal's action. Failures never surface as errors:
//! they move the follower into [`PathFollowerState::RejectGoal`] with a
//! [`RejectionReason`].

use std::collections::{HashSet, VecDeque};
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::time::{Duration, Instant};

use rover_geometry::{Transform, Twist};
use tracing::{debug, info, warn};

use crate::action::{ActiveAction, GoalAction, GoalPointState};
use crate::drive::{Drive, DriveConfig, Driver};
use crate::graph::{NodeGraph, NodeId, prune_transforms};
use crate::world::World;

/// Why a goal was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// No route over the waypoint graph.
    NoPath,
    /// No goal transform was given.
    NullGoal,
    /// The goal is too far from every waypoint.
    TooFar,
    /// No progress within the goal timeout.
    Timeout,
    /// The goal's action cannot be performed.
    InvalidAction,
}

impl RejectionReason {
    /// Message reported to whoever submitted the goal.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::NoPath => "[Goal rejected] Bad plan",
            RejectionReason::NullGoal => "[Goal rejected] Null goal",
            RejectionReason::TooFar => "[Goal rejected] Goal is too far",
            RejectionReason::Timeout => "[Goal rejected] Timeout reached",
            RejectionReason::InvalidAction => "[Goal rejected] Invalid action",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the goal-following machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathFollowerState {
    /// Idle.
    NoGoal,
    /// Driving node to node towards the goal.
    FollowCourse,
    /// Blocked; about to insert a sidestep node.
    Replan,
    /// Driving to the sidestep node.
    AvoidObstacle,
    /// Past the last node, driving straight to the goal.
    CloseToGoal,
    /// At the goal, running its action.
    Action,
    /// The goal was given up.
    RejectGoal(RejectionReason),
}

impl fmt::Display for PathFollowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFollowerState::NoGoal => write!(f, "no_goal"),
            PathFollowerState::FollowCourse => write!(f, "follow_course"),
            PathFollowerState::Replan => write!(f, "replan"),
            PathFollowerState::AvoidObstacle => write!(f, "avoid_obstacle"),
            PathFollowerState::CloseToGoal => write!(f, "close_to_goal"),
            PathFollowerState::Action => write!(f, "action"),
            PathFollowerState::RejectGoal(reason) => write!(f, "reject_goal({})", reason),
        }
    }
}

/// Tuning for [`PathFollower`]. Distances in meters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FollowerConfig {
    /// Smoothed waypoints closer than this to the previous kept one are dropped.
    pub pruning_distance: f64,
    /// Smoothed waypoints closer than this are connected.
    pub connection_distance: f64,
    /// Custom waypoints closer than this are connected.
    pub custom_connection_distance: f64,
    /// How far the sidestep node is placed from the robot.
    pub avoidance_distance: f64,
    /// Direction of the sidestep node relative to the robot heading (rad).
    pub avoidance_angle: f64,
    /// Sidestep obstacles instead of waiting in place.
    pub avoid_obstacles: bool,
    /// Seconds without progress before the goal is rejected. 0, a negative
    /// value or one too large for a `Duration` (such as infinity) disables it.
    pub goal_timeout_secs: f64,
    /// A current node farther than this from the robot is forgotten.
    pub max_distance_from_node: f64,
    /// Goals farther than this from every waypoint are rejected when
    /// `reject_far_goals` is set.
    pub goal_max_distance: f64,
    /// Enables the `goal_max_distance` check.
    pub reject_far_goals: bool,
    /// Point-to-point driving.
    pub drive: DriveConfig,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            pruning_distance: 0.05,
            connection_distance: 0.25,
            custom_connection_distance: 0.5,
            avoidance_distance: 0.25,
            avoidance_angle: FRAC_PI_2,
            avoid_obstacles: false,
            goal_timeout_secs: 30.0,
            max_distance_from_node: 5.0,
            goal_max_distance: 1.0,
            reject_far_goals: false,
            drive: DriveConfig::default(),
        }
    }
}

/// Goal-following state machine over a waypoint graph.
#[derive(Debug)]
pub struct PathFollower {
    config: FollowerConfig,
    driver: Driver,
    waypoints: Vec<Transform>,
    node_connection_distance: f64,
    graph: NodeGraph,
    state: PathFollowerState,
    goal: Option<Transform>,
    action: GoalAction,
    active_action: Option<ActiveAction>,
    current: Option<NodeId>,
    path: VecDeque<NodeId>,
    avoid_node: Option<NodeId>,
    goal_timeout: Option<Duration>,
    progress_at: Instant,
    twist: Twist,
    actuators: bool,
}

impl PathFollower {
    /// An idle follower with no waypoints.
    pub fn new(config: FollowerConfig, now: Instant) -> Self {
        let goal_timeout = Duration::try_from_secs_f64(config.goal_timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero());
        if goal_timeout.is_none() {
            info!(secs = config.goal_timeout_secs, "Goal timeout disabled");
        }
        PathFollower {
            goal_timeout,
            driver: Driver::new(config.drive.clone()),
            node_connection_distance: config.connection_distance,
            config,
            waypoints: Vec::new(),
            graph: NodeGraph::new(),
            state: PathFollowerState::NoGoal,
            goal: None,
            action: GoalAction::NoAction,
            active_action: None,
            current: None,
            path: VecDeque::new(),
            avoid_node: None,
            progress_at: now,
            twist: Twist::stop(),
            actuators: false,
        }
    }

    /// Tuning in use.
    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> PathFollowerState {
        self.state
    }

    /// Reason of the last rejection, while rejected.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self.state {
            PathFollowerState::RejectGoal(reason) => Some(reason),
            _ => None,
        }
    }

    /// The goal being followed.
    pub fn goal(&self) -> Option<&Transform> {
        self.goal.as_ref()
    }

    /// The working graph. Rebuilt on every new goal, edited by avoidance.
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Remaining waypoints of the active path, for telemetry.
    pub fn path(&self) -> Vec<Transform> {
        self.path
            .iter()
            .filter_map(|&id| self.graph.transform(id).copied())
            .collect()
    }

    /// Whether the cleaning actuators should be running.
    pub fn actuators(&self) -> bool {
        self.actuators
    }

    /// Loads the waypoints of a new world: the custom ones as-is if there
    /// are any, the pruned smoothed trajectory otherwise.
    pub fn on_new_world(&mut self, world: &World) {
        if world.custom_transforms.is_empty() {
            self.waypoints = prune_transforms(&world.smoothed_transforms, self.config.pruning_distance);
            self.node_connection_distance = self.config.connection_distance;
        } else {
            self.waypoints = world.custom_transforms.clone();
            self.node_connection_distance = self.config.custom_connection_distance;
        }
        info!(
            custom = world.custom_transforms.len(),
            smoothed = world.smoothed_transforms.len(),
            kept = self.waypoints.len(),
            "Reloaded path nodes"
        );
        self.graph = NodeGraph::build(&self.waypoints, self.node_connection_distance);
        self.current = None;
        self.clear_goal();
    }

    /// Starts following `goal`, ending its action with `action`.
    ///
    /// The graph is rebuilt from the world's waypoints, dropping any
    /// sidestep nodes left over from the previous goal. A missing goal is
    /// rejected right away; an unreachable one on the next tick.
    pub fn set_goal(&mut self, goal: Option<Transform>, action: GoalAction, now: Instant) {
        debug!(nodes = self.waypoints.len(), "Computing distances to nodes");
        self.graph = NodeGraph::build(&self.waypoints, self.node_connection_distance);
        self.current = None;
        self.clear_goal();

        let Some(goal) = goal else {
            self.reject(RejectionReason::NullGoal);
            return;
        };
        if self.config.reject_far_goals {
            let nearest = self
                .graph
                .closest_node(&goal)
                .and_then(|id| self.graph.transform(id))
                .map(|tf| tf.planar_distance_to(&goal));
            if nearest.is_none_or(|d| d > self.config.goal_max_distance) {
                self.reject(RejectionReason::TooFar);
                return;
            }
        }
        info!(goal = %goal, action = %action, "New goal");
        self.progress_at = now;
        self.state = PathFollowerState::FollowCourse;
        self.goal = Some(goal);
        self.action = action;
    }

    /// Drops the goal and goes idle.
    pub fn clear_goal(&mut self) {
        self.goal = None;
        self.path.clear();
        self.active_action = None;
        self.actuators = false;
        self.state = PathFollowerState::NoGoal;
    }

    fn reject(&mut self, reason: RejectionReason) {
        warn!(%reason, "Goal rejected");
        self.state = PathFollowerState::RejectGoal(reason);
    }

    fn command(&mut self, twist: Twist) {
        self.twist = twist;
    }

    fn stop(&mut self) {
        self.twist = self.driver.stop();
    }

    fn hold_angular(&mut self) {
        let held = Twist::new(0.0, self.twist.wz);
        self.twist = self.driver.commanded(held);
    }

    /// Advances the machine by one control tick and returns the velocity
    /// command for the robot at `location`. `blocked` reports an obstacle
    /// right in front of the robot.
    pub fn on_update(&mut self, location: &Transform, blocked: bool, now: Instant) -> Twist {
        if let Some(current) = self.current {
            let limit = self.config.max_distance_from_node * self.config.max_distance_from_node;
            match self.graph.transform(current) {
                None => {
                    debug!(node = %current, "Current node was removed from the graph");
                    self.current = None;
                }
                Some(tf) if tf.planar_distance_to_squared(location) > limit => {
                    warn!(node = %current, "Robot is too far away from the current node");
                    self.current = None;
                }
                Some(_) => {}
            }
        }
        if self.current.is_none() {
            debug!("Resetting current node");
            self.current = self.graph.closest_node(location);
        }
        debug!(state = %self.state, path = self.path.len(), "Path follower tick");

        if self.state == PathFollowerState::FollowCourse {
            self.plan_if_needed(now);
        }

        match self.state {
            PathFollowerState::FollowCourse => self.follow_course(location, blocked, now),
            PathFollowerState::Replan => self.replan(location),
            PathFollowerState::AvoidObstacle => self.avoid_obstacle(location, blocked, now),
            PathFollowerState::CloseToGoal => self.close_to_goal(location, blocked, now),
            PathFollowerState::Action => self.run_action(now, blocked),
            PathFollowerState::NoGoal | PathFollowerState::RejectGoal(_) => {
                self.stop();
                self.actuators = false;
            }
        }
        self.twist
    }

    fn plan_if_needed(&mut self, now: Instant) {
        if self.path.front() != self.current.as_ref() {
            self.path.clear();
        }
        if !self.path.is_empty() {
            return;
        }
        let target = self.goal.as_ref().and_then(|goal| self.graph.closest_node(goal));
        match (self.current, target) {
            (Some(current), Some(target)) if current == target => {
                info!("Goal is next to the current node, driving straight to it");
                self.state = PathFollowerState::CloseToGoal;
            }
            (Some(current), Some(target)) => match self.graph.plan(current, target) {
                Some(plan) if !plan.is_empty() => {
                    info!(%current, %target, nodes = plan.len(), "New path");
                    self.path = plan.into_steps().into();
                    self.progress_at = now;
                }
                _ => self.reject(RejectionReason::NoPath),
            },
            (None, _) => {
                info!("Unable to generate path, robot is too far from the waypoints");
                self.reject(RejectionReason::NoPath);
            }
            (_, None) => {
                info!("Unable to generate path, goal is too far from the waypoints");
                self.reject(RejectionReason::NoPath);
            }
        }
    }

    fn follow_course(&mut self, location: &Transform, blocked: bool, now: Instant) {
        while let Some(&head) = self.path.front() {
            let Some(head_tf) = self.graph.transform(head).copied() else {
                self.path.clear();
                break;
            };
            match self.driver.drive_to(location, &head_tf, false, false) {
                Drive::Moving(twist) => {
                    self.command(twist);
                    break;
                }
                Drive::Arrived => {
                    debug!(node = %head, "Reached path node");
                    self.path.pop_front();
                    self.progress_at = now;
                    match self.path.front() {
                        Some(&next) => self.current = Some(next),
                        None => {
                            info!("Last path node reached, going directly to goal");
                            self.state = PathFollowerState::CloseToGoal;
                        }
                    }
                }
            }
        }

        if blocked && self.state == PathFollowerState::FollowCourse {
            if self.config.avoid_obstacles {
                self.state = PathFollowerState::Replan;
            } else {
                self.hold_angular();
            }
        }

        if let Some(timeout) = self.goal_timeout {
            if now.saturating_duration_since(self.progress_at) > timeout {
                self.reject(RejectionReason::Timeout);
            }
        }
    }

    fn replan(&mut self, location: &Transform) {
        info!("Path is blocked, recomputing");
        self.stop();

        let angle = self.config.avoidance_angle;
        let distance = self.config.avoidance_distance;
        let offset = Transform::new(distance * angle.cos(), distance * angle.sin(), 0.0, 0.0);
        let extra = self.graph.add_node(location.compose(&offset));

        let mut force = HashSet::new();
        if let Some(&blocked) = self.path.front() {
            debug!(node = %blocked, "Removing blocked path node");
            if let Ok(former) = self.graph.remove_node(blocked) {
                force.extend(former);
            }
        }
        if let Err(e) = self.graph.connect_nearby(extra, self.node_connection_distance, &force) {
            warn!(error = %e, "Could not connect avoidance node");
        }
        debug!(node = %extra, "Added avoidance node");

        self.path.clear();
        self.path.push_back(extra);
        self.avoid_node = Some(extra);
        self.state = PathFollowerState::AvoidObstacle;
    }

    fn avoid_obstacle(&mut self, location: &Transform, blocked: bool, now: Instant) {
        let Some(target) = self.avoid_node.and_then(|id| self.graph.transform(id)).copied() else {
            self.state = PathFollowerState::Replan;
            return;
        };
        match self.driver.drive_to(location, &target, false, true) {
            Drive::Arrived => {
                debug!("Avoidance node reached");
                self.path.clear();
                self.current = None;
                self.avoid_node = None;
                self.progress_at = now;
                self.state = PathFollowerState::FollowCourse;
            }
            Drive::Moving(twist) => {
                self.command(twist);
                if blocked {
                    self.avoid_node = None;
                    self.state = PathFollowerState::Replan;
                }
            }
        }
    }

    fn close_to_goal(&mut self, location: &Transform, blocked: bool, now: Instant) {
        let Some(goal) = self.goal else {
            self.clear_goal();
            return;
        };
        let align = self.action.aligns_rotation();
        match self.driver.drive_to(location, &goal, align, false) {
            Drive::Moving(twist) => self.command(twist),
            Drive::Arrived => {
                if self.action.terminates_immediately() {
                    info!(goal = %goal, "Goal reached");
                    self.clear_goal();
                } else if let Some(active) = self.action.start(now) {
                    self.active_action = Some(active);
                    self.state = PathFollowerState::Action;
                } else {
                    warn!(action = %self.action, "Rejecting goal for bad action");
                    self.reject(RejectionReason::InvalidAction);
                }
                self.stop();
            }
        }
        if blocked {
            self.hold_angular();
        }
    }

    fn run_action(&mut self, now: Instant, blocked: bool) {
        let Some(active) = self.active_action else {
            self.reject(RejectionReason::InvalidAction);
            return;
        };
        let step = active.step(now, blocked);
        self.twist = self.driver.commanded(step.twist);
        self.actuators = step.actuators;
        match step.state {
            GoalPointState::Completed => {
                info!("Goal action finished");
                self.clear_goal();
            }
            GoalPointState::Rejected => self.reject(RejectionReason::InvalidAction),
            GoalPointState::New | GoalPointState::Running => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn line(xs: &[f64]) -> World {
        World {
            smoothed_transforms: xs.iter().map(|&x| Transform::new(x, 0.0, 0.0, 0.0)).collect(),
            ..Default::default()
        }
    }

    fn at(x: f64, y: f64) -> Transform {
        Transform::new(x, y, 0.0, 0.0)
    }

    fn follower(config: FollowerConfig, world: &World, now: Instant) -> PathFollower {
        let mut follower = PathFollower::new(config, now);
        follower.on_new_world(world);
        follower
    }

    fn chain_config() -> FollowerConfig {
        FollowerConfig { connection_distance: 0.5, ..Default::default() }
    }

    #[test]
    fn test_rejection_strings() {
        assert_eq!(RejectionReason::NoPath.to_string(), "[Goal rejected] Bad plan");
        assert_eq!(RejectionReason::NullGoal.as_str(), "[Goal rejected] Null goal");
        assert_eq!(RejectionReason::TooFar.as_str(), "[Goal rejected] Goal is too far");
        assert_eq!(RejectionReason::Timeout.as_str(), "[Goal rejected] Timeout reached");
        assert_eq!(RejectionReason::InvalidAction.as_str(), "[Goal rejected] Invalid action");
    }

    #[test]
    fn test_null_goal_rejected_immediately() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4]), t0);
        follower.set_goal(None, GoalAction::NoAction, t0);
        assert_eq!(follower.state(), PathFollowerState::RejectGoal(RejectionReason::NullGoal));
        assert_eq!(follower.on_update(&at(0.0, 0.0), false, t0), Twist::stop());
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::NullGoal));
    }

    #[test]
    fn test_far_goal_rejected() {
        let t0 = Instant::now();
        let config = FollowerConfig { reject_far_goals: true, ..chain_config() };
        let mut follower = follower(config, &line(&[0.0, 0.4]), t0);
        follower.set_goal(Some(at(3.0, 0.0)), GoalAction::NoAction, t0);
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::TooFar));
        follower.set_goal(Some(at(0.9, 0.0)), GoalAction::NoAction, t0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);
    }

    #[test]
    fn test_disconnected_goal_rejected_on_next_tick() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.3, 5.0, 5.3]), t0);
        follower.set_goal(Some(at(5.3, 0.0)), GoalAction::NoAction, t0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);

        let twist = follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::NoPath));
        assert_eq!(twist, Twist::stop());
    }

    #[test]
    fn test_follow_course_then_timeout() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4, 0.8, 1.2]), t0);
        follower.set_goal(Some(at(1.2, 0.0)), GoalAction::NoAction, t0);

        let twist = follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);
        assert!(twist.vx > 0.0);
        // The start node is reached on the first tick.
        assert_eq!(follower.path().len(), 3);

        follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(10));
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);

        follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(31));
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::Timeout));
    }

    #[test]
    fn test_arrival_at_goal() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4, 0.8]), t0);
        follower.set_goal(Some(at(0.8, 0.0)), GoalAction::NoAction, t0);
        follower.on_update(&at(0.8, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::NoGoal);
        assert!(follower.goal().is_none());
    }

    #[test]
    fn test_drives_along_path_to_goal() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4, 0.8]), t0);
        follower.set_goal(Some(at(0.8, 0.0)), GoalAction::NoAction, t0);
        follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);
        follower.on_update(&at(0.4, 0.0), false, t0);
        assert_eq!(follower.path().len(), 1);
        follower.on_update(&at(0.8, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::CloseToGoal);
        follower.on_update(&at(0.8, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::NoGoal);
    }

    #[test]
    fn test_blocked_without_avoidance_holds_angular() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4, 0.8]), t0);
        follower.set_goal(Some(at(0.8, 0.0)), GoalAction::NoAction, t0);
        let twist = follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(twist.vx, 0.0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);
    }

    #[test]
    fn test_blocked_inserts_avoidance_node() {
        let t0 = Instant::now();
        let config = FollowerConfig { avoid_obstacles: true, ..chain_config() };
        let mut follower = follower(config, &line(&[0.0, 0.4, 0.8, 1.2]), t0);
        follower.set_goal(Some(at(1.2, 0.0)), GoalAction::NoAction, t0);

        follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(follower.state(), PathFollowerState::Replan);

        let twist = follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(twist, Twist::stop());
        assert_eq!(follower.state(), PathFollowerState::AvoidObstacle);
        assert_eq!(follower.graph().len(), 4);
        let path = follower.path();
        assert_eq!(path.len(), 1);
        assert!(path[0].x().abs() < EPSILON);
        assert!((path[0].y() - 0.25).abs() < EPSILON);
        // The blocked node at x = 0.4 is gone.
        assert!(follower.graph().ids().all(|id| (follower.graph().transform(id).unwrap().x() - 0.4).abs() > EPSILON));

        follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::AvoidObstacle);
        follower.on_update(&at(0.0, 0.2), false, t0);
        assert_eq!(follower.state(), PathFollowerState::FollowCourse);
    }

    #[test]
    fn test_unbounded_timeout_never_fires() {
        let t0 = Instant::now();
        for secs in [f64::INFINITY, f64::NAN, 1e300, -1.0] {
            let config = FollowerConfig { goal_timeout_secs: secs, ..chain_config() };
            let mut follower = follower(config, &line(&[0.0, 0.4, 0.8, 1.2]), t0);
            follower.set_goal(Some(at(1.2, 0.0)), GoalAction::NoAction, t0);
            follower.on_update(&at(0.0, 0.0), false, t0);
            follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(3600));
            assert_eq!(follower.state(), PathFollowerState::FollowCourse);
        }
    }

    #[test]
    fn test_still_blocked_avoidance_replans() {
        let t0 = Instant::now();
        let config = FollowerConfig { avoid_obstacles: true, ..chain_config() };
        let mut follower = follower(config, &line(&[0.0, 0.4, 0.8, 1.2]), t0);
        follower.set_goal(Some(at(1.2, 0.0)), GoalAction::NoAction, t0);
        follower.on_update(&at(0.0, 0.0), true, t0);
        follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(follower.state(), PathFollowerState::AvoidObstacle);
        let first = follower.avoid_node.unwrap();

        // Still turning towards the sidestep when the obstacle shows up again.
        follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(follower.state(), PathFollowerState::Replan);

        let twist = follower.on_update(&at(0.0, 0.0), true, t0);
        assert_eq!(twist, Twist::stop());
        assert_eq!(follower.state(), PathFollowerState::AvoidObstacle);
        let second = follower.avoid_node.unwrap();
        assert_ne!(first, second);
        assert!(!follower.graph().contains(first));
        assert!(follower.graph().contains(second));
        assert_eq!(follower.graph().len(), 4);
        let path = follower.path();
        assert_eq!(path.len(), 1);
        assert!((path[0].y() - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_removed_current_node_is_resnapped() {
        let t0 = Instant::now();
        let config = FollowerConfig { avoid_obstacles: true, ..chain_config() };
        let mut follower = follower(config, &line(&[0.0, 0.4, 0.8, 1.2]), t0);
        follower.set_goal(Some(at(1.2, 0.0)), GoalAction::NoAction, t0);
        follower.on_update(&at(0.0, 0.0), true, t0);
        let removed = follower.current.unwrap();
        follower.on_update(&at(0.0, 0.0), true, t0);
        assert!(!follower.graph().contains(removed));

        follower.on_update(&at(0.0, 0.0), false, t0);
        let current = follower.current.unwrap();
        assert!(follower.graph().contains(current));
        assert!(follower.graph().transform(current).unwrap().x().abs() < EPSILON);
    }

    #[test]
    fn test_action_lost_rejects_goal() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4]), t0);
        follower.set_goal(Some(at(0.0, 0.0)), GoalAction::VacuumSpiral, t0);
        follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::Action);

        follower.active_action = None;
        follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(1));
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::InvalidAction));
        assert_eq!(follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(2)), Twist::stop());
        assert!(!follower.actuators());
    }

    #[test]
    fn test_spiral_action_runs_to_completion() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4]), t0);
        follower.set_goal(Some(at(0.0, 0.0)), GoalAction::VacuumSpiral, t0);
        follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.state(), PathFollowerState::Action);

        let twist = follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(15));
        assert!(follower.actuators());
        assert!((twist.vx - 0.1).abs() < EPSILON);

        follower.on_update(&at(0.0, 0.0), false, t0 + Duration::from_secs(31));
        assert_eq!(follower.state(), PathFollowerState::NoGoal);
        assert!(!follower.actuators());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let t0 = Instant::now();
        let mut follower = follower(chain_config(), &line(&[0.0, 0.4]), t0);
        follower.set_goal(Some(at(0.0, 0.0)), GoalAction::Unrecognized("dance".into()), t0);
        follower.on_update(&at(0.0, 0.0), false, t0);
        assert_eq!(follower.rejection_reason(), Some(RejectionReason::InvalidAction));
    }

    #[test]
    fn test_custom_waypoints_take_precedence() {
        let t0 = Instant::now();
        let world = World {
            custom_transforms: vec![at(0.0, 0.0), at(0.45, 0.0)],
            smoothed_transforms: vec![at(5.0, 5.0)],
            ..Default::default()
        };
        let follower = follower(FollowerConfig::default(), &world, t0);
        assert_eq!(follower.graph().len(), 2);
        assert!(follower.graph().validate_connections());
    }
}
