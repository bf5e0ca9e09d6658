#![warn(missing_docs)]
#![doc = "Navigation core for a mobile robot."]
#![doc = ""]
#![doc = "This crate provides obstacle cost maps with inflation and source fusion,"]
#![doc = "A* and Dijkstra grid planners, a waypoint graph with a goal-following"]
#![doc = "state machine, and a pure-pursuit path tracker."]

pub mod action;
pub mod drive;
pub mod error;
pub mod follower;
pub mod goal;
pub mod graph;
pub mod map;
pub mod path;
pub mod path_finder;
pub mod pursuit;
pub mod world;

pub use action::{GoalAction, GoalPointState};
pub use drive::{DriveConfig, Driver};
pub use error::NavigationError;
pub use follower::{FollowerConfig, PathFollower, PathFollowerState, RejectionReason};
pub use goal::{GoalDecision, GoalPointFollower, GoalProcessor, GoalTarget};
pub use graph::{NodeGraph, NodeId, PathNode};
pub use map::{CostMap, CostMapPose, CostMapStore, InflationConfig, Source};
pub use path::Path;
pub use path_finder::{GridPathFinder, PathFinder, PathResult, SearchKind};
pub use pursuit::{PurePursuit, PursuitConfig, PursuitVelocityGenerator};
pub use world::{PointOfInterest, World};
