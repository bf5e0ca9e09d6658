#![warn(missing_docs)]

//! Error types for the geometry library.

use core::fmt;

/// Errors that can occur when building or integrating transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A rotation quaternion with zero (or non-finite) norm was supplied.
    InvalidRotation(&'static str),
    /// A negative time delta was used for pose integration.
    NegativeTimeDelta(&'static str),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidRotation(msg) => write!(f, "Invalid rotation: {}", msg),
            GeometryError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
        }
    }
}

impl core::error::Error for GeometryError {}
