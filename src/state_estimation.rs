use rover_geometry::{GeometryError, Transform, Twist, integrate};
use rover_navigation::{CostMap, CostMapPose, map::INSCRIBED_COST};

// Calculates a new pose from the previous pose, the applied twist and the
// elapsed time (unicycle odometry).
pub fn update_pose(previous_pose: &Transform, applied_twist: &Twist, dt: f64) -> Result<Transform, GeometryError> {
    integrate(previous_pose, applied_twist, dt)
}

/// True if the cell `lookahead` meters in front of `pose` is at least
/// inscribed. Cells outside the map count as free: an absent map means no
/// sensor has reported anything there.
pub fn is_blocked(map: &CostMap, pose: &Transform, lookahead: f64) -> bool {
    let ahead = pose.compose(&Transform::new(lookahead, 0.0, 0.0, 0.0));
    let cell = CostMapPose::from_transform(&ahead, map.resolution());
    map.index(cell.x(), cell.y())
        .is_some_and(|index| map.grid()[index] >= INSCRIBED_COST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_navigation::{Source, map::OBSTACLE_COST};

    #[test]
    fn test_update_pose_moves_forward() {
        let pose = update_pose(&Transform::default(), &Twist::new(1.0, 0.0), 0.1).unwrap();
        assert!((pose.x() - 0.1).abs() < 1e-9);
        assert!(update_pose(&pose, &Twist::stop(), -1.0).is_err());
    }

    #[test]
    fn test_blocked_only_by_cells_ahead() {
        let mut map = CostMap::filled(Source::Bumper, 0.1, (0, 0), 10, 10, 0).unwrap();
        map.set_cost(5, 2, OBSTACLE_COST).unwrap();
        let facing = Transform::new(0.25, 0.25, 0.0, 0.0);
        assert!(is_blocked(&map, &facing, 0.3));
        let away = Transform::new(0.25, 0.25, 0.0, std::f64::consts::PI);
        assert!(!is_blocked(&map, &away, 0.3));
        let empty = CostMap::empty(Source::Inflated, 0.1).unwrap();
        assert!(!is_blocked(&empty, &facing, 0.3));
    }
}
