//! What the robot does once it reaches a goal.

use std::fmt;
use std::time::{Duration, Instant};

use rover_geometry::Twist;
use tracing::info;

/// Length of a spiral run.
pub const SPIRAL_DURATION: Duration = Duration::from_secs(30);
/// Forward speed during a spiral run (m/s).
pub const SPIRAL_SPEED: f64 = 0.1;
/// Radius reached at the end of a spiral run (m).
pub const SPIRAL_RADIUS: f64 = 0.3;
// Keeps the first spiral command finite.
const SPIRAL_MIN_RADIUS: f64 = 0.01;

/// Action attached to a goal point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GoalAction {
    /// Stop at the goal.
    #[default]
    NoAction,
    /// Stop at the goal facing the goal's heading.
    AlignRotation,
    /// Drive an outward spiral while the vacuum runs.
    VacuumSpiral,
    /// An action this robot does not know how to perform.
    Unrecognized(String),
}

impl GoalAction {
    /// True for actions that are done as soon as the goal is reached.
    pub fn terminates_immediately(&self) -> bool {
        matches!(self, GoalAction::NoAction | GoalAction::AlignRotation)
    }

    /// True if reaching the goal also requires matching its heading.
    pub fn aligns_rotation(&self) -> bool {
        matches!(self, GoalAction::AlignRotation)
    }

    /// Starts the action at `now`, or `None` if it cannot run.
    pub fn start(&self, now: Instant) -> Option<ActiveAction> {
        match self {
            GoalAction::VacuumSpiral => {
                info!("Starting vacuuming");
                Some(ActiveAction::Spiral { started: now })
            }
            _ => None,
        }
    }
}

impl fmt::Display for GoalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalAction::NoAction => write!(f, "no_action"),
            GoalAction::AlignRotation => write!(f, "align_rotation"),
            GoalAction::VacuumSpiral => write!(f, "vacuum_spiral"),
            GoalAction::Unrecognized(name) => write!(f, "unrecognized({})", name),
        }
    }
}

/// Lifecycle of a goal point as seen by whoever submitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalPointState {
    /// Submitted, not yet handed to the follower.
    New,
    /// Being driven to or acted on.
    Running,
    /// Reached and its action finished.
    Completed,
    /// Given up on.
    Rejected,
}

/// One tick of a running action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionStep {
    /// `Running` while the action goes on, then `Completed` or `Rejected`.
    pub state: GoalPointState,
    /// Command for this tick.
    pub twist: Twist,
    /// Whether the cleaning actuators should be on.
    pub actuators: bool,
}

/// An action in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveAction {
    /// Spiral started at the given instant.
    Spiral {
        /// When the spiral began.
        started: Instant,
    },
}

impl ActiveAction {
    /// Advances the action. A blocked robot keeps turning but stops moving
    /// forward.
    pub fn step(&self, now: Instant, blocked: bool) -> ActionStep {
        match *self {
            ActiveAction::Spiral { started } => {
                let elapsed = now.saturating_duration_since(started);
                if elapsed > SPIRAL_DURATION {
                    return ActionStep { state: GoalPointState::Completed, twist: Twist::stop(), actuators: false };
                }
                let radius =
                    (SPIRAL_RADIUS * elapsed.as_secs_f64() / SPIRAL_DURATION.as_secs_f64()).max(SPIRAL_MIN_RADIUS);
                let wz = SPIRAL_SPEED / radius;
                let vx = if blocked { 0.0 } else { SPIRAL_SPEED };
                ActionStep { state: GoalPointState::Running, twist: Twist::new(vx, wz), actuators: true }
            }
        }
    }
}
