use std::fmt;
use std::ops::Index;

use crate::map::{CostMap, CostMapPose, is_obstacle};

/// An ordered, immutable sequence of steps from a start to a goal.
///
/// Grid planners produce `Path<CostMapPose>`, the waypoint graph planner
/// produces `Path<NodeId>`. Equality is element-wise and order-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path<T> {
    steps: Vec<T>,
}

impl<T> Path<T> {
    /// Wraps a step sequence.
    pub fn new(steps: Vec<T>) -> Self {
        Path { steps }
    }

    /// Number of steps, start and goal included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the path has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First step.
    pub fn first(&self) -> Option<&T> {
        self.steps.first()
    }

    /// Last step.
    pub fn last(&self) -> Option<&T> {
        self.steps.last()
    }

    /// Steps in traversal order.
    pub fn steps(&self) -> &[T] {
        &self.steps
    }

    /// Iterator over the steps.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.steps.iter()
    }

    /// Unwraps the step sequence.
    pub fn into_steps(self) -> Vec<T> {
        self.steps
    }
}

impl Path<CostMapPose> {
    /// True if any step lies on an obstacle of `map`, cells outside the map
    /// included. A path with fewer than two steps or an empty map carries no
    /// information and never counts as blocked.
    pub fn passes_through_obstacle(&self, map: &CostMap) -> bool {
        if self.steps.len() < 2 || map.is_empty() {
            return false;
        }
        self.steps.iter().any(|step| is_obstacle(map.cost_at(step)))
    }
}

impl<T> Index<usize> for Path<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.steps[index]
    }
}

impl<T> IntoIterator for Path<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Path<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl<T: fmt::Display> fmt::Display for Path<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", step)?;
        }
        write!(f, "]")
    }
}
