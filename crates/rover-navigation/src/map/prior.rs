use rover_geometry::Transform;
use tracing::{info, warn};

use super::costmap::{CostMap, FREE_COST, MAX_FREE_COST, Source};
use super::pose::CostMapPose;
use crate::error::NavigationError;
use crate::world::World;

/// Radius of the corridor grown around every trajectory point (m).
pub const PATH_GROWING_RADIUS: f64 = 0.25;
/// Padding added around the trajectory bounds by [`prior_trajectory_map_for_world`] (m).
pub const DEFAULT_PADDING: f64 = 3.0;
/// Cost of cells away from the trajectory. Kept well below the obstacle
/// range so a robot that strays off the corridor can still plan back.
pub const BACKGROUND_COST: u8 = MAX_FREE_COST / 6;
/// Cost of the outer half of the corridor.
pub const MIDDLE_COST: u8 = BACKGROUND_COST / 2;

/// Builds a static, published cost map that favours the cells around a
/// recorded trajectory.
///
/// The grid covers the trajectory bounds grown by [`PATH_GROWING_RADIUS`]
/// plus `padding` (x, y) and starts at [`BACKGROUND_COST`]. Every point then
/// carves a disc of [`MIDDLE_COST`] of the full radius and a free disc of
/// half the radius. The outer ring is skipped when both radii round to the
/// same number of cells. The map is tagged [`Source::PriorTrajectory`] and is
/// not inflated by the store.
///
/// # Errors
/// * `InvalidResolution` if `resolution` is not positive
/// * `InvalidParameter` if a padding is negative or not finite
pub fn prior_trajectory_map(
    trajectory: &[Transform],
    resolution: f64,
    padding: (f64, f64),
) -> Result<CostMap, NavigationError> {
    if !(resolution > 0.0) {
        return Err(NavigationError::InvalidResolution("Resolution must be positive"));
    }
    if !(padding.0 >= 0.0 && padding.1 >= 0.0) || !padding.0.is_finite() || !padding.1.is_finite() {
        return Err(NavigationError::InvalidParameter("Padding must be non-negative"));
    }
    let Some(first) = trajectory.first() else {
        warn!("Empty prior trajectory");
        return Ok(CostMap::empty(Source::PriorTrajectory, resolution)?.into_published());
    };

    let (mut min, mut max) = ((first.x(), first.y()), (first.x(), first.y()));
    for tf in trajectory {
        min = (min.0.min(tf.x()), min.1.min(tf.y()));
        max = (max.0.max(tf.x()), max.1.max(tf.y()));
    }
    let grow = (PATH_GROWING_RADIUS + padding.0, PATH_GROWING_RADIUS + padding.1);
    let frame = CostMap::from_bounds(
        Source::PriorTrajectory,
        resolution,
        (min.0 - grow.0, min.1 - grow.1),
        (max.0 + grow.0, max.1 + grow.1),
    )?;
    let mut map = CostMap::filled(
        Source::PriorTrajectory,
        resolution,
        (frame.lower_x(), frame.lower_y()),
        frame.width(),
        frame.height(),
        BACKGROUND_COST,
    )?;

    let outer = (PATH_GROWING_RADIUS / resolution).round() as i32;
    let inner = (PATH_GROWING_RADIUS / 2.0 / resolution).round() as i32;
    let cells: Vec<(i32, i32)> = trajectory
        .iter()
        .map(|tf| {
            let cell = CostMapPose::from_transform(tf, resolution);
            (cell.x(), cell.y())
        })
        .collect();
    if outer != inner {
        for &cell in &cells {
            map.draw_disc(cell, outer, MIDDLE_COST)?;
        }
    }
    for &cell in &cells {
        map.draw_disc(cell, inner, FREE_COST)?;
    }

    info!(
        points = trajectory.len(),
        width = map.width(),
        height = map.height(),
        "Created prior trajectory cost map"
    );
    Ok(map.into_published())
}

/// [`prior_trajectory_map`] over the world's waypoints (custom if any,
/// smoothed otherwise) with [`DEFAULT_PADDING`] on both axes.
pub fn prior_trajectory_map_for_world(world: &World, resolution: f64) -> Result<CostMap, NavigationError> {
    prior_trajectory_map(world.waypoints(), resolution, (DEFAULT_PADDING, DEFAULT_PADDING))
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: u8 = BACKGROUND_COST;
    const O: u8 = FREE_COST;

    fn at(x: f64, y: f64) -> Transform {
        Transform::new(x, y, 0.0, 0.0)
    }

    fn recorded() -> Vec<Transform> {
        vec![at(0.0, 0.0), at(0.0, 0.4), at(0.4, 0.8), at(0.8, 1.0), at(1.2, 0.6), at(1.4, 0.2)]
    }

    #[test]
    fn test_costs() {
        assert_eq!(BACKGROUND_COST, 21);
        assert_eq!(MIDDLE_COST, 10);
    }

    #[test]
    fn test_trajectory_without_padding() {
        let map = prior_trajectory_map(&recorded(), 0.2, (0.0, 0.0)).unwrap();
        assert_eq!(map.source(), Source::PriorTrajectory);
        assert!(!map.is_mutable());
        assert_eq!((map.lower_x(), map.lower_y()), (-2, -2));
        assert_eq!((map.width(), map.height()), (11, 9));
        #[rustfmt::skip]
        let expected = [
            B, B, B, B, B, B, B, B, B, B, B,
            B, B, O, B, B, B, B, B, B, B, B,
            B, O, O, O, B, B, B, B, O, B, B,
            B, B, O, B, B, B, B, O, O, O, B,
            B, O, O, O, B, B, O, O, O, B, B,
            B, B, O, B, O, B, B, O, B, B, B,
            B, B, B, O, O, O, O, B, B, B, B,
            B, B, B, B, O, O, O, O, B, B, B,
            B, B, B, B, B, B, O, B, B, B, B,
        ];
        assert_eq!(map.grid(), &expected);
    }

    #[test]
    fn test_padding_grows_background() {
        let plain = prior_trajectory_map(&recorded(), 0.2, (0.0, 0.0)).unwrap();
        let padded = prior_trajectory_map(&recorded(), 0.2, (1.0, 1.0)).unwrap();
        assert_eq!((padded.width(), padded.height()), (21, 19));
        for y in plain.lower_y()..plain.upper_y() {
            for x in plain.lower_x()..plain.upper_x() {
                assert_eq!(padded.get_cost(x, y), plain.get_cost(x, y));
            }
        }
        assert_eq!(padded.get_cost(padded.lower_x(), padded.lower_y()), B);
    }

    #[test]
    fn test_outer_ring_when_radii_differ() {
        let map = prior_trajectory_map(&[at(0.0, 0.0)], 0.1, (0.0, 0.0)).unwrap();
        assert_eq!(map.get_cost(0, 0), O);
        assert_eq!(map.get_cost(1, 0), O);
        assert_eq!(map.get_cost(2, 0), MIDDLE_COST);
        assert_eq!(map.get_cost(0, 2), MIDDLE_COST);
        assert_eq!(map.get_cost(-3, -3), B);
    }

    #[test]
    fn test_world_and_invalid_input() {
        let world = World { smoothed_transforms: recorded(), ..Default::default() };
        let map = prior_trajectory_map_for_world(&world, 0.2).unwrap();
        assert_eq!(map.get_cost(0, 0), O);
        assert!(map.width() > 11);

        assert!(prior_trajectory_map_for_world(&World::default(), 0.2).unwrap().is_empty());
        assert!(matches!(
            prior_trajectory_map(&recorded(), 0.2, (-1.0, 0.0)),
            Err(NavigationError::InvalidParameter(_))
        ));
        assert!(matches!(
            prior_trajectory_map(&recorded(), 0.0, (0.0, 0.0)),
            Err(NavigationError::InvalidResolution(_))
        ));
    }
}
