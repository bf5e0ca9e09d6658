use tracing::debug;

use super::costmap::{CostMap, Source};
use crate::error::NavigationError;

/// A polygon of obstacle outline in world coordinates, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    /// Expiry time in seconds, on the same clock as [`GeometryCostMap::update`].
    pub expires_at: f64,
    /// Outline vertices `(x, y)` in meters.
    pub polygon: Vec<(f64, f64)>,
}

impl Geometry {
    /// Creates a geometry.
    pub fn new(expires_at: f64, polygon: Vec<(f64, f64)>) -> Self {
        Geometry { expires_at, polygon }
    }
}

/// A cost map source fed by batches of obstacle polygons (bumper contacts,
/// detected furniture outlines...).
///
/// Each [`update`](GeometryCostMap::update) drops expired geometry, adds the
/// new batch, and rebuilds the grid from scratch over the remaining outlines
/// grown by the robot radius. The rebuilt map is returned published so it can
/// be handed straight to readers.
#[derive(Debug)]
pub struct GeometryCostMap {
    source: Source,
    resolution: f64,
    robot_radius: f64,
    geometries: Vec<Geometry>,
}

impl GeometryCostMap {
    /// Creates an empty geometry source.
    pub fn new(source: Source, resolution: f64, robot_radius: f64) -> Result<Self, NavigationError> {
        if !(resolution > 0.0) {
            return Err(NavigationError::InvalidResolution("Resolution must be positive"));
        }
        Ok(GeometryCostMap { source, resolution, robot_radius, geometries: Vec::new() })
    }

    /// The bumper contact source.
    pub fn bumper(resolution: f64, robot_radius: f64) -> Result<Self, NavigationError> {
        Self::new(Source::Bumper, resolution, robot_radius)
    }

    /// Producer tag of the maps this source builds.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Geometry currently contributing to the map.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Replaces this source's contribution as of `timestamp`.
    pub fn update(&mut self, timestamp: f64, batch: Vec<Geometry>) -> Result<CostMap, NavigationError> {
        self.geometries.retain(|g| g.expires_at >= timestamp);
        self.geometries.extend(batch.into_iter().filter(|g| !g.polygon.is_empty()));

        let Some((min, max)) = self.bounds() else {
            debug!(source = %self.source, "No live geometry, cost map cleared");
            return Ok(CostMap::empty(self.source, self.resolution)?.into_published());
        };

        let mut map = CostMap::from_bounds(self.source, self.resolution, min, max)?;
        for geometry in &self.geometries {
            let vertices: Vec<(i32, i32)> = geometry
                .polygon
                .iter()
                .map(|&(x, y)| {
                    (
                        (x / self.resolution).floor() as i32,
                        (y / self.resolution).floor() as i32,
                    )
                })
                .collect();
            map.draw_polygon(&vertices)?;
        }
        debug!(
            source = %self.source,
            geometries = self.geometries.len(),
            x = ?(map.lower_x(), map.upper_x()),
            y = ?(map.lower_y(), map.upper_y()),
            "Cost map rebuilt"
        );
        Ok(map.into_published())
    }

    /// Drops everything that expired before `timestamp`.
    pub fn clear(&mut self, timestamp: f64) -> Result<CostMap, NavigationError> {
        self.update(timestamp, Vec::new())
    }

    fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut points = self.geometries.iter().flat_map(|g| g.polygon.iter());
        let &(x0, y0) = points.next()?;
        let (mut min, mut max) = ((x0, y0), (x0, y0));
        for &(x, y) in points {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        let r = self.robot_radius;
        Some(((min.0 - r, min.1 - r), (max.0 + r, max.1 + r)))
    }
}
