//! The mapped world the robot navigates in.

use rover_geometry::Transform;

/// A named place in the world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointOfInterest {
    /// Name goals refer to it by.
    pub name: String,
    /// Where it is.
    pub location: Transform,
}

/// Waypoints recorded while mapping, plus the named places in the map.
///
/// Custom waypoints are hand-placed and take precedence over the smoothed
/// trajectory when both exist.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct World {
    /// Named places.
    pub points_of_interest: Vec<PointOfInterest>,
    /// Hand-placed waypoints.
    pub custom_transforms: Vec<Transform>,
    /// Smoothed mapping trajectory.
    pub smoothed_transforms: Vec<Transform>,
}

impl World {
    /// Location of the point of interest called `name`.
    pub fn point_of_interest(&self, name: &str) -> Option<&Transform> {
        self.points_of_interest
            .iter()
            .find(|poi| poi.name == name)
            .map(|poi| &poi.location)
    }

    /// Waypoints goals should be picked from: the custom ones if any, the
    /// smoothed trajectory otherwise.
    pub fn waypoints(&self) -> &[Transform] {
        if self.custom_transforms.is_empty() {
            &self.smoothed_transforms
        } else {
            &self.custom_transforms
        }
    }
}
