//! This module defines the error types used by the `rover-navigation` crate.

#![warn(missing_docs)]

/// Error type for navigation operations.
///
/// These are structural errors: they indicate a caller bug (a malformed grid,
/// a node wired to itself) rather than a runtime condition. Expected outcomes
/// such as "no route" or a rejected goal are reported as values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// Error for invalid map resolution.
    /// This variant is returned when a map resolution is not positive, or when
    /// maps with different resolutions are combined.
    InvalidResolution(&'static str),
    /// Error for invalid map dimensions.
    /// This variant is returned when the grid length does not match width × height.
    InvalidDimensions(&'static str),
    /// Error for out-of-bounds writes.
    OutOfBounds(&'static str),
    /// A published cost map was written to.
    Immutable(&'static str),
    /// A path node was offered as its own neighbour.
    SelfNeighbor(&'static str),
    /// A negative (or NaN) distance was stored between path nodes.
    NegativeDistance(&'static str),
    /// A node id that is not part of the graph.
    UnknownNode(&'static str),
    /// A controller or planner parameter is out of range.
    InvalidParameter(&'static str),
}

impl core::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NavigationError::InvalidResolution(msg) => write!(f, "Invalid map resolution: {}", msg),
            NavigationError::InvalidDimensions(msg) => write!(f, "Invalid map dimensions: {}", msg),
            NavigationError::OutOfBounds(msg) => write!(f, "Map access out of bounds: {}", msg),
            NavigationError::Immutable(msg) => write!(f, "Cost map is published: {}", msg),
            NavigationError::SelfNeighbor(msg) => write!(f, "Node cannot neighbour itself: {}", msg),
            NavigationError::NegativeDistance(msg) => write!(f, "Invalid node distance: {}", msg),
            NavigationError::UnknownNode(msg) => write!(f, "Unknown path node: {}", msg),
            NavigationError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl core::error::Error for NavigationError {}
