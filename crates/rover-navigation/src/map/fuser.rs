use super::costmap::{CostMap, FREE_COST, Source};
use crate::error::NavigationError;

/// Merges source maps into one grid covering the union of their bounds.
///
/// Each cell takes the maximum cost over every source covering it; cells no
/// source covers are free. All inputs must share `resolution`. Empty inputs
/// are ignored, and with no covering input an empty map is returned.
pub fn fuse<'a, I>(maps: I, resolution: f64) -> Result<CostMap, NavigationError>
where
    I: IntoIterator<Item = &'a CostMap>,
{
    let maps: Vec<&CostMap> = maps.into_iter().filter(|m| !m.is_empty()).collect();
    if maps
        .iter()
        .any(|m| (m.resolution() - resolution).abs() > f64::EPSILON * resolution)
    {
        return Err(NavigationError::InvalidResolution("Fused maps must share one resolution"));
    }
    if maps.is_empty() {
        return CostMap::empty(Source::Fused, resolution);
    }

    let lower_x = maps.iter().map(|m| m.lower_x()).min().unwrap_or(0);
    let lower_y = maps.iter().map(|m| m.lower_y()).min().unwrap_or(0);
    let upper_x = maps.iter().map(|m| m.upper_x()).max().unwrap_or(0);
    let upper_y = maps.iter().map(|m| m.upper_y()).max().unwrap_or(0);
    let width = (upper_x - lower_x) as usize;
    let height = (upper_y - lower_y) as usize;

    let mut grid = vec![FREE_COST; width * height];
    for map in &maps {
        for y in map.lower_y()..map.upper_y() {
            let row = (y - lower_y) as usize * width;
            for x in map.lower_x()..map.upper_x() {
                let cell = &mut grid[row + (x - lower_x) as usize];
                *cell = (*cell).max(map.get_cost(x, y));
            }
        }
    }
    CostMap::new(Source::Fused, resolution, (lower_x, lower_y), width, height, grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::costmap::OBSTACLE_COST;

    #[test]
    fn test_fuse_takes_max_over_union() {
        let mut a = CostMap::filled(Source::Perception, 0.5, (0, 0), 2, 2, 10).unwrap();
        a.set_cost(1, 1, 80).unwrap();
        let mut b = CostMap::filled(Source::Bumper, 0.5, (1, 1), 2, 2, 20).unwrap();
        b.set_cost(2, 2, OBSTACLE_COST).unwrap();

        let fused = fuse([&a, &b], 0.5).unwrap();
        assert_eq!((fused.lower_x(), fused.lower_y()), (0, 0));
        assert_eq!((fused.upper_x(), fused.upper_y()), (3, 3));
        assert_eq!(fused.get_cost(0, 0), 10);
        assert_eq!(fused.get_cost(1, 1), 80);
        assert_eq!(fused.get_cost(2, 1), 20);
        assert_eq!(fused.get_cost(2, 2), OBSTACLE_COST);
        // Covered by neither source.
        assert_eq!(fused.get_cost(2, 0), FREE_COST);
        assert_eq!(fused.source(), Source::Fused);
    }

    #[test]
    fn test_fuse_rejects_mixed_resolution() {
        let a = CostMap::filled(Source::Perception, 0.5, (0, 0), 1, 1, 0).unwrap();
        let b = CostMap::filled(Source::Bumper, 0.1, (0, 0), 1, 1, 0).unwrap();
        assert!(matches!(fuse([&a, &b], 0.5), Err(NavigationError::InvalidResolution(_))));
    }

    #[test]
    fn test_fuse_nothing() {
        let empty = CostMap::empty(Source::Bumper, 0.5).unwrap();
        let fused = fuse([&empty], 0.5).unwrap();
        assert!(fused.is_empty());
    }
}
