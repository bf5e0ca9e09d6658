use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use rover_geometry::{Transform, Twist};
use rover_navigation::{GoalPointState, PathFollowerState};

/// Latest robot state, shared between the control thread and the async tasks.
#[derive(Clone)]
pub struct State {
    pub pose: Transform,
    pub twist: Twist,
    pub blocked: bool,
    pub follower_state: PathFollowerState,
    pub goal: Option<Transform>,
    pub goal_state: Option<GoalPointState>,
    pub last_cmd_ts: Instant,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: Transform::default(),
            twist: Twist::default(),
            blocked: false,
            follower_state: PathFollowerState::NoGoal,
            goal: None,
            goal_state: None,
            last_cmd_ts: Instant::now(),
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

/// Records a command issued by the control loop.
pub fn touch_cmd(bb: &Blackboard, twist: Twist) {
    let mut g = bb.write();
    g.twist = twist;
    g.last_cmd_ts = Instant::now();
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}
