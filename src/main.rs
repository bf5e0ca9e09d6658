mod blackboard; // shared robot state
mod bus; // broadcast topics
mod navigation; // control loop and simulated world
mod settings; // typed configuration
mod state_estimation; // odometry and obstacle checks

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use blackboard::{Blackboard, clear_fault, raise_fault, snapshot};
use bus::Topic;
use rover_navigation::map::prior_trajectory_map_for_world;
use rover_navigation::{CostMapStore, GoalDecision, GoalPointFollower, PathFollower};
use settings::{Settings, SimConfig};
use spin_sleep::SpinSleeper;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CMD_TIMEOUT_FAULT: &str = "cmd_vel timeout";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Rover navigation simulation starting.");
    let settings = settings::load_settings()?;
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(settings));
    if let Err(e) = &result {
        error!("Simulation failed: {:?}", e);
    }
    result
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let Settings { sim, follower: follower_config, pursuit, inflation } = settings;
    let bb: Blackboard = Arc::default();
    let running = Arc::new(AtomicBool::new(true));
    let goal_topic: Topic<GoalDecision> = Topic::new(8);

    let world = navigation::waypoint_loop(&sim);
    let store = Arc::new(CostMapStore::new(sim.resolution, &inflation)?);
    store.replace(navigation::arena_map(&sim)?)?;
    store.replace(prior_trajectory_map_for_world(&world, sim.resolution)?)?;
    store.rebuild()?;

    let mut follower = PathFollower::new(follower_config, Instant::now());
    follower.on_new_world(&world);
    let follower = GoalPointFollower::new(follower);

    info!("Spawning sensor thread...");
    let sensor = std::thread::Builder::new().name("sensor".into()).spawn({
        let bb = Arc::clone(&bb);
        let running = Arc::clone(&running);
        let period = Duration::from_millis(sim.sensor_period_ms);
        move || sensor_loop(bb, period, running)
    })?;

    info!("Spawning control thread...");
    let control = std::thread::Builder::new().name("control".into()).spawn({
        let bb = Arc::clone(&bb);
        let store = Arc::clone(&store);
        let goal_rx = goal_topic.subscribe();
        let sim = sim.clone();
        let running = Arc::clone(&running);
        move || navigation::control_loop(bb, store, goal_rx, follower, sim, running)
    })?;

    let tasks = async {
        tokio::try_join!(
            navigation::goal_task(bb.clone(), world, goal_topic.clone(), sim.clone()),
            navigation::perception_task(bb.clone(), Arc::clone(&store), sim.clone(), pursuit, inflation.robot_radius),
            watchdog(bb.clone(), sim.clone()),
        )
        .map(|_| ())
    };
    let result = if sim.run_secs > 0 {
        tokio::select! {
            r = tasks => r,
            _ = tokio::time::sleep(Duration::from_secs(sim.run_secs)) => {
                info!(secs = sim.run_secs, "Run time elapsed.");
                Ok(())
            }
        }
    } else {
        tasks.await
    };

    running.store(false, Ordering::Relaxed);
    for handle in [sensor, control] {
        if handle.join().is_err() {
            warn!("A worker thread panicked.");
        }
    }
    let state = snapshot(&bb);
    info!(pose = %state.pose, follower = %state.follower_state, faults = ?state.faults, "Simulation finished.");
    result
}

// Integrates the last commanded twist into the blackboard pose.
fn sensor_loop(bb: Blackboard, period: Duration, running: Arc<AtomicBool>) {
    info!("Sensor thread started.");
    let sleeper = SpinSleeper::new(10_000);
    let mut last = Instant::now();
    while running.load(Ordering::Relaxed) {
        sleeper.sleep(period);
        let now = Instant::now();
        let dt = (now - last).as_secs_f64();
        last = now;
        let state = snapshot(&bb);
        match state_estimation::update_pose(&state.pose, &state.twist, dt) {
            Ok(pose) => bb.write().pose = pose,
            Err(e) => warn!(error = %e, "Odometry update skipped"),
        }
    }
}

async fn watchdog(bb: Blackboard, sim: SimConfig) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let timeout = Duration::from_millis(sim.watchdog_timeout_ms);
    let mut tick = tokio::time::interval(Duration::from_millis(25));
    loop {
        tick.tick().await;
        let last_cmd_ts = snapshot(&bb).last_cmd_ts;
        let age = Instant::now().saturating_duration_since(last_cmd_ts);
        if age > timeout {
            warn!(?age, "Command velocity timeout! Stopping the robot.");
            bb.write().twist = rover_geometry::Twist::stop();
            raise_fault(&bb, CMD_TIMEOUT_FAULT);
        } else {
            clear_fault(&bb, CMD_TIMEOUT_FAULT);
        }
    }
}
