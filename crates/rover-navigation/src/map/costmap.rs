#![warn(missing_docs)]

use std::fmt;

use super::CostMapPose;
use crate::error::NavigationError;

/// Cost of a cell with nothing in it.
pub const FREE_COST: u8 = 0;
/// Cost of a cell the robot body is guaranteed to overlap an obstacle from.
pub const INSCRIBED_COST: u8 = 120;
/// Highest cost a traversable cell may carry.
pub const MAX_FREE_COST: u8 = 126;
/// Hard obstacle sentinel.
pub const OBSTACLE_COST: u8 = 127;

/// Returns true if `cost` is the obstacle sentinel.
pub fn is_obstacle(cost: u8) -> bool {
    cost == OBSTACLE_COST
}

/// The producer of a cost map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Source {
    /// Obstacles observed by depth/point-cloud perception.
    Perception,
    /// Contact geometry reported by the bumper.
    Bumper,
    /// A prebuilt map of the world.
    StaticMap,
    /// Corridors around the world's recorded trajectory.
    PriorTrajectory,
    /// Per-cell maximum of several sources.
    Fused,
    /// A fused map after inflation.
    Inflated,
}

impl Source {
    /// False for sources whose costs already encode clearance and are merged
    /// after inflation.
    pub fn requires_inflation(&self) -> bool {
        !matches!(self, Source::PriorTrajectory)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Perception => "perception",
            Source::Bumper => "bumper",
            Source::StaticMap => "static_map",
            Source::PriorTrajectory => "prior_trajectory",
            Source::Fused => "fused",
            Source::Inflated => "inflated",
        };
        f.write_str(name)
    }
}

/// A rectangular grid of per-cell traversal costs covering
/// `[lower_x, lower_x + width) × [lower_y, lower_y + height)` in cell units.
///
/// Cells are stored row-major by y. A map starts mutable and is owned by the
/// single source that writes it; once [`CostMap::publish`] is called it is
/// frozen and may be shared with any number of readers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostMap {
    source: Source,
    resolution: f64,
    lower_x: i32,
    lower_y: i32,
    width: usize,
    height: usize,
    grid: Vec<u8>,
    mutable: bool,
}

impl CostMap {
    /// Creates a cost map from an existing grid.
    ///
    /// # Arguments
    /// * `source` - Producer of this map
    /// * `resolution` - Meters per cell
    /// * `lower` - Cell coordinates of the first grid entry
    /// * `width`, `height` - Grid size in cells
    /// * `grid` - Row-major costs, `width * height` long
    ///
    /// # Errors
    /// * `InvalidResolution` if `resolution` is not positive
    /// * `InvalidDimensions` if the grid length does not match, or the size overflows
    pub fn new(
        source: Source,
        resolution: f64,
        lower: (i32, i32),
        width: usize,
        height: usize,
        grid: Vec<u8>,
    ) -> Result<Self, NavigationError> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(NavigationError::InvalidResolution("Resolution must be positive"));
        }
        let cells = width
            .checked_mul(height)
            .ok_or(NavigationError::InvalidDimensions("Map dimensions too large, would cause overflow"))?;
        if grid.len() != cells {
            return Err(NavigationError::InvalidDimensions("Grid length must equal width * height"));
        }
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(NavigationError::InvalidDimensions("Map dimensions exceed the cell coordinate range"));
        }
        Ok(CostMap {
            source,
            resolution,
            lower_x: lower.0,
            lower_y: lower.1,
            width,
            height,
            grid,
            mutable: true,
        })
    }

    /// Creates a map with every cell set to `cost`.
    pub fn filled(
        source: Source,
        resolution: f64,
        lower: (i32, i32),
        width: usize,
        height: usize,
        cost: u8,
    ) -> Result<Self, NavigationError> {
        let cells = width
            .checked_mul(height)
            .ok_or(NavigationError::InvalidDimensions("Map dimensions too large, would cause overflow"))?;
        Self::new(source, resolution, lower, width, height, vec![cost; cells])
    }

    /// A map with no cells. Every read on it returns the obstacle cost.
    pub fn empty(source: Source, resolution: f64) -> Result<Self, NavigationError> {
        Self::new(source, resolution, (0, 0), 0, 0, Vec::new())
    }

    /// Creates a free map covering the world-space box `min..max` (meters).
    ///
    /// The lower bound is floored onto the grid and the upper bound is ceiled,
    /// nudged by a tiny epsilon so a box ending exactly on a cell edge still
    /// includes that edge's cell.
    pub fn from_bounds(
        source: Source,
        resolution: f64,
        min: (f64, f64),
        max: (f64, f64),
    ) -> Result<Self, NavigationError> {
        if !(resolution > 0.0) {
            return Err(NavigationError::InvalidResolution("Resolution must be positive"));
        }
        if max.0 < min.0 || max.1 < min.1 {
            return Err(NavigationError::InvalidDimensions("Upper bound is below lower bound"));
        }
        let start_x = (min.0 / resolution).floor() as i32;
        let start_y = (min.1 / resolution).floor() as i32;
        let end_x = (max.0 / resolution + resolution / 1e9).ceil() as i32;
        let end_y = (max.1 / resolution + resolution / 1e9).ceil() as i32;
        let width = (end_x - start_x).max(0) as usize;
        let height = (end_y - start_y).max(0) as usize;
        Self::filled(source, resolution, (start_x, start_y), width, height, FREE_COST)
    }

    /// Producer of this map.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Retags the map, e.g. when a fused grid becomes an inflated one.
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Meters per cell.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Lowest x cell (inclusive).
    pub fn lower_x(&self) -> i32 {
        self.lower_x
    }

    /// Lowest y cell (inclusive).
    pub fn lower_y(&self) -> i32 {
        self.lower_y
    }

    /// Highest x cell (exclusive).
    pub fn upper_x(&self) -> i32 {
        self.lower_x + self.width as i32
    }

    /// Highest y cell (exclusive).
    pub fn upper_y(&self) -> i32 {
        self.lower_y + self.height as i32
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major costs.
    pub fn grid(&self) -> &[u8] {
        &self.grid
    }

    /// True if the map has no cells.
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// True if `(x, y)` lies inside the grid.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= self.lower_x && x < self.upper_x() && y >= self.lower_y && y < self.upper_y()
    }

    /// Index into [`CostMap::grid`] for cell `(x, y)`, if in bounds.
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let col = (x - self.lower_x) as usize;
        let row = (y - self.lower_y) as usize;
        Some(row * self.width + col)
    }

    /// Cost of cell `(x, y)`. Cells outside the grid are obstacles.
    pub fn get_cost(&self, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(OBSTACLE_COST, |i| self.grid[i])
    }

    /// Cost at a pose.
    pub fn cost_at(&self, pose: &CostMapPose) -> u8 {
        self.get_cost(pose.x(), pose.y())
    }

    /// Writes the cost of cell `(x, y)`.
    ///
    /// # Errors
    /// * `Immutable` if the map has been published
    /// * `OutOfBounds` if the cell is outside the grid
    pub fn set_cost(&mut self, x: i32, y: i32, cost: u8) -> Result<(), NavigationError> {
        if !self.mutable {
            return Err(NavigationError::Immutable("Cannot write to a published cost map"));
        }
        let index = self
            .index(x, y)
            .ok_or(NavigationError::OutOfBounds("Cell outside cost map bounds"))?;
        self.grid[index] = cost;
        Ok(())
    }

    /// False once the map has been published.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Freezes the map. Idempotent.
    pub fn publish(&mut self) {
        self.mutable = false;
    }

    /// Consumes the map and returns it frozen.
    pub fn into_published(mut self) -> Self {
        self.publish();
        self
    }

    /// An editable copy of this map, e.g. to start the next revision of a source.
    pub fn to_mutable(&self) -> Self {
        let mut copy = self.clone();
        copy.mutable = true;
        copy
    }

    /// Cells among the 8 neighbours of `pose` whose cost is at most `max_cost`.
    pub fn neighbors_for(&self, pose: &CostMapPose, max_cost: u8) -> Vec<CostMapPose> {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dx, dy)| pose.offset_by(dx, dy))
            .filter(|p| self.cost_at(p) <= max_cost)
            .collect()
    }

    /// Highest cost inside the inclusive cell rectangle `min..=max`. Parts of
    /// the rectangle outside the map count as obstacles.
    pub fn highest_cost_in_region(&self, min: (i32, i32), max: (i32, i32)) -> u8 {
        let mut highest = FREE_COST;
        for y in min.1..=max.1 {
            for x in min.0..=max.0 {
                highest = highest.max(self.get_cost(x, y));
                if highest == OBSTACLE_COST {
                    return highest;
                }
            }
        }
        highest
    }

    /// Marks every cell the segment `from..to` passes through with `cost`.
    /// Cells outside the grid are skipped.
    ///
    /// # Errors
    /// * `Immutable` if the map has been published
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), cost: u8) -> Result<(), NavigationError> {
        if !self.mutable {
            return Err(NavigationError::Immutable("Cannot draw on a published cost map"));
        }
        for (x, y) in supercover_line(from, to) {
            if let Some(i) = self.index(x, y) {
                self.grid[i] = cost;
            }
        }
        Ok(())
    }

    /// Sets every cell within `radius` cells (Euclidean, in cell units) of
    /// `center` to `cost`, one row span at a time.
    ///
    /// # Errors
    /// * `Immutable` if the map has been published
    pub fn draw_disc(&mut self, center: (i32, i32), radius: i32, cost: u8) -> Result<(), NavigationError> {
        let radius = radius.max(0);
        for dy in -radius..=radius {
            let half = ((radius * radius - dy * dy) as f64).sqrt().floor() as i32;
            let y = center.1 + dy;
            self.draw_line((center.0 - half, y), (center.0 + half, y), cost)?;
        }
        Ok(())
    }

    /// Outlines a closed polygon with obstacle cells.
    pub fn draw_polygon(&mut self, vertices: &[(i32, i32)]) -> Result<(), NavigationError> {
        match vertices {
            [] => Ok(()),
            [single] => self.draw_line(*single, *single, OBSTACLE_COST),
            _ => {
                for (i, &from) in vertices.iter().enumerate() {
                    let to = vertices[(i + 1) % vertices.len()];
                    self.draw_line(from, to, OBSTACLE_COST)?;
                }
                Ok(())
            }
        }
    }
}

/// Axis neighbours first, then diagonals.
pub(crate) const NEIGHBOR_OFFSETS: [(i32, i32); 8] =
    [(1, 0), (0, 1), (-1, 0), (0, -1), (1, 1), (-1, 1), (-1, -1), (1, -1)];

/// Every cell touched by the segment between two cell centers. When the
/// segment passes exactly through a cell corner it steps diagonally.
fn supercover_line(from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (nx, ny) = (dx.abs() as i64, dy.abs() as i64);
    let (sx, sy) = (dx.signum(), dy.signum());
    let (mut x, mut y) = from;
    let mut cells = Vec::with_capacity((nx + ny + 1) as usize);
    cells.push((x, y));
    let (mut ix, mut iy) = (0i64, 0i64);
    while ix < nx || iy < ny {
        let decision = (1 + 2 * ix) * ny - (1 + 2 * iy) * nx;
        if decision == 0 {
            x += sx;
            y += sy;
            ix += 1;
            iy += 1;
        } else if decision < 0 {
            x += sx;
            ix += 1;
        } else {
            y += sy;
            iy += 1;
        }
        cells.push((x, y));
    }
    cells
}

impl fmt::Display for CostMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CostMap[{}] x: [{}, {}) y: [{}, {}) res: {}",
            self.source,
            self.lower_x,
            self.upper_x(),
            self.lower_y,
            self.upper_y(),
            self.resolution
        )?;
        for row in self.grid.chunks(self.width.max(1)) {
            for cost in row {
                write!(f, "{:3} ", cost)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
