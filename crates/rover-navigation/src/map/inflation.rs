//! Obstacle inflation.
//!
//! Every non-obstacle cell takes the highest cost found within the robot
//! radius (a square window of `ceil(radius / resolution)` cells). Obstacles
//! inside the window make the cell an obstacle; inscribed-range costs are
//! capped at [`INSCRIBED_COST`]; lower penalties spread unchanged. Cost
//! therefore never decreases as you walk towards an obstacle, and a cell
//! reached by two overlapping windows keeps the larger value.

use tracing::debug;

use super::costmap::{CostMap, INSCRIBED_COST, OBSTACLE_COST, Source, is_obstacle};
use crate::error::NavigationError;

/// How the robot radius is turned into an inflation radius.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InflationMode {
    /// Inflate by the full robot radius.
    FullRadius,
    /// Inflate by `radius * factor`.
    FactorRadius(f64),
}

/// Inflation parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InflationConfig {
    /// Robot radius in meters.
    pub robot_radius: f64,
    /// Radius scaling.
    pub mode: InflationMode,
}

impl Default for InflationConfig {
    fn default() -> Self {
        Self { robot_radius: 0.2, mode: InflationMode::FullRadius }
    }
}

/// Produces inflated copies of cost maps.
#[derive(Debug, Clone)]
pub struct Inflator {
    resolution: f64,
    radius: f64,
}

impl Inflator {
    /// Creates an inflator for maps of `resolution` meters per cell.
    pub fn new(resolution: f64, config: &InflationConfig) -> Result<Self, NavigationError> {
        if !(resolution > 0.0) {
            return Err(NavigationError::InvalidResolution("Resolution must be positive"));
        }
        let factor = match config.mode {
            InflationMode::FullRadius => 1.0,
            InflationMode::FactorRadius(factor) => factor,
        };
        let radius = config.robot_radius * factor;
        if !radius.is_finite() || radius < 0.0 {
            return Err(NavigationError::InvalidParameter("Inflation radius must be non-negative"));
        }
        Ok(Inflator { resolution, radius })
    }

    /// Inflation radius in cells.
    pub fn radius_cells(&self) -> i32 {
        (self.radius / self.resolution).ceil() as i32
    }

    /// Returns a published, inflated copy of `map`. The input is only read.
    pub fn inflate(&self, map: &CostMap) -> Result<CostMap, NavigationError> {
        if (map.resolution() - self.resolution).abs() > f64::EPSILON * self.resolution {
            return Err(NavigationError::InvalidResolution("Map resolution does not match inflator"));
        }
        let (width, height) = (map.width() as i32, map.height() as i32);
        // A window wider than the map covers the same cells.
        let radius = self.radius_cells().min(width.max(height));
        let source = map.grid();
        let mut grid = source.to_vec();

        if radius > 0 {
            for row in 0..height {
                for col in 0..width {
                    let index = (row * width + col) as usize;
                    if is_obstacle(source[index]) {
                        continue;
                    }
                    let mut highest = source[index];
                    'window: for y in (row - radius).max(0)..=(row + radius).min(height - 1) {
                        for x in (col - radius).max(0)..=(col + radius).min(width - 1) {
                            highest = highest.max(source[(y * width + x) as usize]);
                            if is_obstacle(highest) {
                                break 'window;
                            }
                        }
                    }
                    grid[index] = inflated_cost(highest);
                }
            }
        }

        debug!(radius_cells = radius, width, height, "Inflated cost map");
        Ok(CostMap::new(
            Source::Inflated,
            map.resolution(),
            (map.lower_x(), map.lower_y()),
            map.width(),
            map.height(),
            grid,
        )?
        .into_published())
    }
}

fn inflated_cost(highest: u8) -> u8 {
    if highest == OBSTACLE_COST {
        OBSTACLE_COST
    } else if highest >= INSCRIBED_COST {
        INSCRIBED_COST
    } else {
        highest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radius_one() -> InflationConfig {
        InflationConfig { robot_radius: 0.98f64.sqrt(), mode: InflationMode::FullRadius }
    }

    fn rows(map: &CostMap) -> Vec<Vec<u8>> {
        map.grid().chunks(map.width()).map(|r| r.to_vec()).collect()
    }

    fn l_shape(lower: (i32, i32)) -> CostMap {
        #[rustfmt::skip]
        let grid = vec![
            127, 127, 127, 127, 127,
            127, 100,  50,   0,   0,
            127,  50,   0,   0,   0,
            127,   0,   0,   0,   0,
            127,   0,   0,   0,   0,
        ];
        CostMap::new(Source::Perception, 1.0, lower, 5, 5, grid).unwrap()
    }

    #[test]
    fn test_radius_cells() {
        assert_eq!(Inflator::new(1.0, &radius_one()).unwrap().radius_cells(), 1);
        let factor = InflationConfig { robot_radius: 0.2, mode: InflationMode::FactorRadius(2.0) };
        assert_eq!(Inflator::new(0.1, &factor).unwrap().radius_cells(), 4);
    }

    #[test]
    fn test_inflate_wall() {
        let mut map = CostMap::filled(Source::Perception, 1.0, (0, 0), 5, 5, 0).unwrap();
        for y in 0..5 {
            map.set_cost(0, y, OBSTACLE_COST).unwrap();
        }
        let inflated = Inflator::new(1.0, &radius_one()).unwrap().inflate(&map).unwrap();
        for row in rows(&inflated) {
            assert_eq!(row, vec![127, 127, 0, 0, 0]);
        }
        assert!(!inflated.is_mutable());
        assert_eq!(inflated.source(), Source::Inflated);
    }

    #[test]
    fn test_inflate_l_shape() {
        let expected = vec![
            vec![127, 127, 127, 127, 127],
            vec![127, 127, 127, 127, 127],
            vec![127, 127, 100, 50, 0],
            vec![127, 127, 50, 0, 0],
            vec![127, 127, 0, 0, 0],
        ];
        let inflator = Inflator::new(1.0, &radius_one()).unwrap();
        assert_eq!(rows(&inflator.inflate(&l_shape((0, 0))).unwrap()), expected);

        let offset = inflator.inflate(&l_shape((1, 3))).unwrap();
        assert_eq!(rows(&offset), expected);
        assert_eq!((offset.lower_x(), offset.lower_y()), (1, 3));
    }

    #[test]
    fn test_inflation_is_monotone() {
        let input = l_shape((0, 0));
        let output = Inflator::new(1.0, &radius_one()).unwrap().inflate(&input).unwrap();
        for (before, after) in input.grid().iter().zip(output.grid()) {
            assert!(after >= before);
        }
    }

    #[test]
    fn test_inscribed_cap() {
        let mut map = CostMap::filled(Source::Perception, 1.0, (0, 0), 3, 1, 0).unwrap();
        map.set_cost(0, 0, 125).unwrap();
        let out = Inflator::new(1.0, &radius_one()).unwrap().inflate(&map).unwrap();
        assert_eq!(out.grid(), &[INSCRIBED_COST, INSCRIBED_COST, 0]);
    }

    #[test]
    fn test_huge_radius_covers_whole_map() {
        let config = InflationConfig { robot_radius: 1e12, mode: InflationMode::FullRadius };
        let inflator = Inflator::new(1.0, &config).unwrap();
        assert_eq!(inflator.radius_cells(), i32::MAX);
        let mut map = CostMap::filled(Source::Perception, 1.0, (0, 0), 4, 2, 0).unwrap();
        map.set_cost(3, 1, OBSTACLE_COST).unwrap();
        let out = inflator.inflate(&map).unwrap();
        assert!(out.grid().iter().all(|&c| c == OBSTACLE_COST));
    }

    #[test]
    fn test_zero_radius_copies() {
        let map = l_shape((0, 0));
        let config = InflationConfig { robot_radius: 0.0, mode: InflationMode::FullRadius };
        let out = Inflator::new(1.0, &config).unwrap().inflate(&map).unwrap();
        assert_eq!(out.grid(), map.grid());
        assert!(map.is_mutable());
    }
}
