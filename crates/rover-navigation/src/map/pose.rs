use std::fmt;
use std::hash::{Hash, Hasher};

use rover_geometry::Transform;

/// A discrete cell coordinate together with the resolution of the grid it
/// belongs to.
///
/// Equality and hashing only look at `(x, y)`; the resolution travels along so
/// that a pose can be turned back into a world transform.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostMapPose {
    x: i32,
    y: i32,
    resolution: f64,
}

impl CostMapPose {
    /// Creates a pose at cell `(x, y)` for a grid of `resolution` meters per cell.
    pub fn new(x: i32, y: i32, resolution: f64) -> Self {
        CostMapPose { x, y, resolution }
    }

    /// Discretizes a world position. Cells are half-open, so a point on a cell
    /// boundary belongs to the cell above/right of it.
    pub fn from_world_xy(x: f64, y: f64, resolution: f64) -> Self {
        CostMapPose {
            x: (x / resolution).floor() as i32,
            y: (y / resolution).floor() as i32,
            resolution,
        }
    }

    /// Discretizes the planar position of a transform.
    pub fn from_transform(tf: &Transform, resolution: f64) -> Self {
        Self::from_world_xy(tf.x(), tf.y(), resolution)
    }

    /// Cell x index.
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Cell y index.
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Meters per cell.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// World coordinates of the cell center.
    pub fn world_xy(&self) -> (f64, f64) {
        (
            (self.x as f64 + 0.5) * self.resolution,
            (self.y as f64 + 0.5) * self.resolution,
        )
    }

    /// The cell center as a transform with zero yaw.
    pub fn to_world(&self) -> Transform {
        let (x, y) = self.world_xy();
        Transform::new(x, y, 0.0, 0.0)
    }

    /// The pose `(x + dx, y + dy)` on the same grid.
    pub fn offset_by(&self, dx: i32, dy: i32) -> Self {
        CostMapPose { x: self.x + dx, y: self.y + dy, resolution: self.resolution }
    }

    /// Squared distance in cells.
    pub fn squared_distance_to(&self, other: &CostMapPose) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl PartialEq for CostMapPose {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for CostMapPose {}

impl Hash for CostMapPose {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}

impl fmt::Display for CostMapPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
