use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rover_geometry::Transform;
use rover_navigation::map::{Geometry, GeometryCostMap};
use rover_navigation::{
    CostMap, CostMapPose, CostMapStore, GoalAction, GoalDecision, GoalPointFollower, GoalPointState, GoalProcessor, GoalTarget,
    GridPathFinder, NavigationError, Path, PathFinder, PursuitConfig, PursuitVelocityGenerator, Source, World,
};
use spin_sleep::SpinSleeper;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time;
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, snapshot, touch_cmd};
use crate::bus::Topic;
use crate::settings::SimConfig;
use crate::state_estimation::is_blocked;

/// Smoothed trajectory recorded by driving once around a rectangle centered
/// on the origin.
pub fn waypoint_loop(sim: &SimConfig) -> World {
    let (w, h) = (sim.loop_width / 2.0, sim.loop_height / 2.0);
    let corners = [(-w, -h), (w, -h), (w, h), (-w, h), (-w, -h)];
    let mut smoothed = Vec::new();
    for pair in corners.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let length = (x1 - x0).hypot(y1 - y0);
        let steps = (length / sim.waypoint_spacing).ceil().max(1.0) as usize;
        let yaw = (y1 - y0).atan2(x1 - x0);
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            smoothed.push(Transform::new(x0 + t * (x1 - x0), y0 + t * (y1 - y0), 0.0, yaw));
        }
    }
    World { smoothed_transforms: smoothed, ..Default::default() }
}

// Free space kept around the waypoint loop inside the arena walls.
const ARENA_MARGIN: f64 = 1.0;

/// Static map of the arena: free space around the waypoint loop, walled in.
pub fn arena_map(sim: &SimConfig) -> Result<CostMap, NavigationError> {
    let (w, h) = (sim.loop_width / 2.0 + ARENA_MARGIN, sim.loop_height / 2.0 + ARENA_MARGIN);
    let mut map = CostMap::from_bounds(Source::StaticMap, sim.resolution, (-w, -h), (w, h))?;
    let (x0, y0) = (map.lower_x(), map.lower_y());
    let (x1, y1) = (x0 + map.width() as i32 - 1, y0 + map.height() as i32 - 1);
    map.draw_polygon(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])?;
    Ok(map)
}

/// Goals the simulation cycles through.
pub fn goal_rotation(sim: &SimConfig) -> Vec<GoalProcessor> {
    vec![
        GoalProcessor::RandomDriver,
        GoalProcessor::PatrolDriver { around: GoalTarget::Location(Transform::new(sim.loop_width / 2.0, 0.0, 0.0, 0.0)) },
        GoalProcessor::DrivePoint {
            target: GoalTarget::Location(Transform::new(-sim.loop_width / 2.0, sim.loop_height / 2.0, 0.0, 0.0)),
            action: GoalAction::VacuumSpiral,
        },
        GoalProcessor::DrivePoint {
            target: GoalTarget::Location(Transform::new(0.0, -sim.loop_height / 2.0, 0.0, std::f64::consts::FRAC_PI_2)),
            action: GoalAction::AlignRotation,
        },
    ]
}

/// Fixed-rate goal following. Runs on its own thread until `running` is
/// cleared; every goal, path and follower mutation happens here.
pub fn control_loop(
    bb: Blackboard,
    store: Arc<CostMapStore>,
    mut goal_rx: broadcast::Receiver<Arc<GoalDecision>>,
    mut follower: GoalPointFollower,
    sim: SimConfig,
    running: Arc<AtomicBool>,
) {
    info!("Control thread started.");
    let sleeper = SpinSleeper::new(1_000);
    let period = Duration::from_millis(sim.control_period_ms);
    while running.load(Ordering::Relaxed) {
        match goal_rx.try_recv() {
            Ok(decision) => match decision.as_ref() {
                GoalDecision::Drive { location, action } => {
                    info!(goal = %location, %action, "Goal received");
                    follower.submit(Some(*location), action.clone());
                }
                GoalDecision::Reject | GoalDecision::Preempt => follower.cancel(),
            },
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Control loop missed goals"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
        }

        let pose = snapshot(&bb).pose;
        let blocked = is_blocked(&store.snapshot(), &pose, sim.blocked_lookahead);
        let twist = follower.on_update(&pose, blocked, Instant::now());
        touch_cmd(&bb, twist);
        {
            let mut g = bb.write();
            g.blocked = blocked;
            g.follower_state = follower.follower().state();
            g.goal = follower.follower().goal().copied();
            g.goal_state = follower.goal_state();
        }
        sleeper.sleep(period);
    }
    info!("Control thread stopped.");
}

/// Picks a new goal whenever the previous one is finished.
pub async fn goal_task(bb: Blackboard, world: World, goal_tx: Topic<GoalDecision>, sim: SimConfig) -> anyhow::Result<()> {
    info!("Goal task started.");
    let mut rng = StdRng::seed_from_u64(sim.seed);
    let rotation = goal_rotation(&sim);
    let mut next = 0usize;
    let mut ticker = time::interval(Duration::from_millis(sim.goal_period_ms));
    loop {
        ticker.tick().await;
        let state = snapshot(&bb).goal_state;
        if matches!(state, Some(GoalPointState::New) | Some(GoalPointState::Running)) {
            continue;
        }
        let processor = &rotation[next % rotation.len()];
        next += 1;
        let decision = processor.process(&world, &mut rng, false, false);
        debug!(?processor, ?decision, "Goal processed");
        if let GoalDecision::Drive { .. } = decision {
            goal_tx.publish(decision);
        }
    }
}

/// True when `plan` was made for another goal (or is missing) or when `map`
/// now has an obstacle on it.
pub fn plan_is_stale(plan: Option<&(Transform, Path<CostMapPose>)>, goal: &Transform, map: &CostMap) -> bool {
    match plan {
        Some((planned_for, path)) if planned_for == goal => {
            let blocked = path.passes_through_obstacle(map);
            if blocked {
                info!(%goal, "Grid plan crosses an obstacle, replanning");
            }
            blocked
        }
        _ => true,
    }
}

/// Simulated bumper: occasionally reports a contact just ahead of the robot,
/// rebuilds the bumper source and republishes the inflated map. While a goal
/// is active it keeps a grid plan towards it, replanning when the goal
/// changes or the latest map puts an obstacle on the plan, and logs the
/// pursuit command along it.
pub async fn perception_task(
    bb: Blackboard,
    store: Arc<CostMapStore>,
    sim: SimConfig,
    pursuit: PursuitConfig,
    robot_radius: f64,
) -> anyhow::Result<()> {
    info!("Perception task started.");
    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(sim.seed.wrapping_add(1));
    let mut bumper = GeometryCostMap::bumper(sim.resolution, robot_radius)?;
    let mut planner = GridPathFinder::astar();
    planner.set_cost_map(store.snapshot());
    let mut tracker = PursuitVelocityGenerator::new(pursuit)?;
    let mut plan: Option<(Transform, Path<CostMapPose>)> = None;
    let mut ticker = time::interval(Duration::from_millis(sim.perception_period_ms));
    loop {
        ticker.tick().await;
        let now = started.elapsed().as_secs_f64();
        let state = snapshot(&bb);

        let mut batch = Vec::new();
        if rng.random_bool(sim.bump_probability.clamp(0.0, 1.0)) {
            let hit = state.pose.compose(&Transform::new(robot_radius + 0.05, 0.0, 0.0, 0.0));
            let half = sim.resolution;
            let polygon = vec![
                (hit.x() - half, hit.y() - half),
                (hit.x() + half, hit.y() - half),
                (hit.x() + half, hit.y() + half),
                (hit.x() - half, hit.y() + half),
            ];
            info!(at = %hit, "Bumper contact");
            batch.push(Geometry::new(now + sim.bump_lifetime_secs, polygon));
        }
        let live_before = bumper.geometries().len();
        let added = !batch.is_empty();
        let map = bumper.update(now, batch)?;
        if added || bumper.geometries().len() != live_before {
            store.replace(map)?;
            planner.set_cost_map(store.rebuild()?);
        }

        let Some(goal) = state.goal else {
            plan = None;
            continue;
        };
        if plan_is_stale(plan.as_ref(), &goal, &store.snapshot()) {
            let start = CostMapPose::from_transform(&state.pose, sim.resolution);
            let target = CostMapPose::from_transform(&goal, sim.resolution);
            let result = planner.compute_plan_detailed(&start, &target);
            debug!(%result, "Grid plan to goal");
            plan = result.into_path().map(|path| (goal, path));
            if let Some((_, path)) = &plan {
                tracker.set_path(path);
            }
        }
        if plan.is_some() {
            if let Some(twist) = tracker.compute_velocity(&state.pose) {
                debug!(%twist, "Pursuit command to goal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_loop_is_closed_and_dense() {
        let sim = SimConfig { loop_width: 2.0, loop_height: 1.0, waypoint_spacing: 0.1, ..Default::default() };
        let world = waypoint_loop(&sim);
        let points = &world.smoothed_transforms;
        assert_eq!(points.len(), 60);
        for pair in points.windows(2) {
            assert!(pair[0].planar_distance_to(&pair[1]) <= 0.1 + 1e-9);
        }
        assert!(points[0].planar_distance_to(points.last().unwrap()) <= 0.1 + 1e-9);
    }

    #[test]
    fn test_arena_is_walled() {
        let sim = SimConfig { loop_width: 2.0, loop_height: 2.0, resolution: 0.5, ..Default::default() };
        let map = arena_map(&sim).unwrap();
        assert_eq!((map.width(), map.height()), (9, 9));
        assert_eq!(map.get_cost(map.lower_x(), map.lower_y()), rover_navigation::map::OBSTACLE_COST);
        assert_eq!(map.get_cost(0, 0), rover_navigation::map::FREE_COST);
        assert_eq!(map.grid().iter().filter(|&&c| c != 0).count(), 32);
    }

    #[test]
    fn test_bumper_contact_makes_plan_stale() {
        let sim = SimConfig { resolution: 0.1, ..Default::default() };
        let world = waypoint_loop(&sim);
        let inflation = rover_navigation::InflationConfig { robot_radius: 0.1, ..Default::default() };
        let store = CostMapStore::new(sim.resolution, &inflation).unwrap();
        store.replace(arena_map(&sim).unwrap()).unwrap();
        store.replace(rover_navigation::map::prior_trajectory_map_for_world(&world, sim.resolution).unwrap()).unwrap();
        let mut planner = GridPathFinder::astar();
        planner.set_cost_map(store.rebuild().unwrap());

        let start = Transform::new(-1.0, -1.0, 0.0, 0.0);
        let goal = Transform::new(1.0, -1.0, 0.0, 0.0);
        let path = planner
            .compute_plan(
                &CostMapPose::from_transform(&start, sim.resolution),
                &CostMapPose::from_transform(&goal, sim.resolution),
            )
            .unwrap();
        let plan = Some((goal, path));
        assert!(plan_is_stale(None, &goal, &store.snapshot()));
        assert!(plan_is_stale(plan.as_ref(), &start, &store.snapshot()));
        assert!(!plan_is_stale(plan.as_ref(), &goal, &store.snapshot()));

        let mut bumper = GeometryCostMap::bumper(sim.resolution, 0.1).unwrap();
        let contact = vec![(-0.05, -1.25), (0.05, -1.25), (0.05, -0.75), (-0.05, -0.75)];
        store.replace(bumper.update(0.0, vec![Geometry::new(10.0, contact)]).unwrap()).unwrap();
        store.rebuild().unwrap();
        assert!(plan_is_stale(plan.as_ref(), &goal, &store.snapshot()));
    }

    #[test]
    fn test_goal_rotation_resolves_on_loop() {
        let sim = SimConfig { waypoint_spacing: 0.1, ..Default::default() };
        let world = waypoint_loop(&sim);
        let mut rng = StdRng::seed_from_u64(sim.seed);
        for processor in goal_rotation(&sim) {
            assert!(matches!(processor.process(&world, &mut rng, false, false), GoalDecision::Drive { .. }));
        }
    }
}
