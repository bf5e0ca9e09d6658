//! Grid path finders.
//!
//! Both planners search the 8-connected cell graph of one [`CostMap`]. Moving
//! into a cell costs `(cost + 1) * 10` along an axis and `(cost + 1) * 14`
//! diagonally, so free cells still carry a base movement cost and diagonal
//! steps weigh roughly √2 of an axis step. A* adds the octile heuristic in the
//! same units; Dijkstra is the same search without it. Open-set ties go to the
//! entry pushed first, which keeps results deterministic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::map::costmap::NEIGHBOR_OFFSETS;
use crate::map::{CostMap, CostMapPose, is_obstacle};
use crate::path::Path;

const AXIS_STEP: u64 = 10;
const DIAGONAL_STEP: u64 = 14;

/// A planner that answers "is there a route on this obstacle field".
pub trait PathFinder {
    /// Sets the map subsequent plans search.
    fn set_cost_map(&mut self, map: Arc<CostMap>);

    /// Computes a path from `start` to `goal`, both included, or `None` when
    /// no route exists.
    fn compute_plan(&self, start: &CostMapPose, goal: &CostMapPose) -> Option<Path<CostMapPose>>;
}

/// Search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SearchKind {
    /// Best-first with the octile heuristic.
    AStar,
    /// Uniform cost search.
    Dijkstra,
}

impl SearchKind {
    fn heuristic(&self, from: (i32, i32), to: (i32, i32)) -> u64 {
        match self {
            SearchKind::AStar => octile_distance(from, to),
            SearchKind::Dijkstra => 0,
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKind::AStar => write!(f, "A*"),
            SearchKind::Dijkstra => write!(f, "Dijkstra"),
        }
    }
}

/// Octile distance in edge cost units for a free grid.
pub fn octile_distance(a: (i32, i32), b: (i32, i32)) -> u64 {
    let dx = a.0.abs_diff(b.0) as u64;
    let dy = a.1.abs_diff(b.1) as u64;
    let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
    AXIS_STEP * long + (DIAGONAL_STEP - AXIS_STEP) * short
}

/// Outcome of a search along with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathResult {
    /// The computed path, if one was found.
    pub path: Option<Path<CostMapPose>>,
    /// The total edge cost of the path.
    pub total_cost: Option<u64>,
    /// The number of cells expanded during the search.
    pub nodes_explored: usize,
}

impl PathResult {
    /// A successful search.
    pub fn success(path: Path<CostMapPose>, total_cost: u64, nodes_explored: usize) -> Self {
        Self { path: Some(path), total_cost: Some(total_cost), nodes_explored }
    }

    /// A search that found no route.
    pub fn failure(nodes_explored: usize) -> Self {
        Self { path: None, total_cost: None, nodes_explored }
    }

    /// Returns true if a path was found.
    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }

    /// Returns the path if one was found.
    pub fn into_path(self) -> Option<Path<CostMapPose>> {
        self.path
    }
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "PathResult {{ success: true, path_length: {}, total_cost: {}, nodes_explored: {} }}",
                path.len(),
                self.total_cost.unwrap_or(0),
                self.nodes_explored
            ),
            None => write!(f, "PathResult {{ success: false, nodes_explored: {} }}", self.nodes_explored),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f: u64,
    seq: u64,
    index: usize,
}

// Min-heap on f, then on insertion sequence.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* or Dijkstra over a shared cost map.
#[derive(Debug, Clone)]
pub struct GridPathFinder {
    kind: SearchKind,
    map: Option<Arc<CostMap>>,
}

impl GridPathFinder {
    /// A planner using `kind`, with no map yet.
    pub fn new(kind: SearchKind) -> Self {
        GridPathFinder { kind, map: None }
    }

    /// An A* planner.
    pub fn astar() -> Self {
        Self::new(SearchKind::AStar)
    }

    /// A Dijkstra planner.
    pub fn dijkstra() -> Self {
        Self::new(SearchKind::Dijkstra)
    }

    /// The search strategy.
    pub fn kind(&self) -> SearchKind {
        self.kind
    }

    /// Same as [`PathFinder::compute_plan`] but also reports cost and effort.
    pub fn compute_plan_detailed(&self, start: &CostMapPose, goal: &CostMapPose) -> PathResult {
        let Some(map) = self.map.as_deref() else {
            return PathResult::failure(0);
        };
        let (Some(start_index), Some(goal_index)) = (map.index(start.x(), start.y()), map.index(goal.x(), goal.y()))
        else {
            debug!(%start, %goal, "Plan endpoint outside cost map");
            return PathResult::failure(0);
        };
        if is_obstacle(map.grid()[start_index]) || is_obstacle(map.grid()[goal_index]) {
            debug!(%start, %goal, "Plan endpoint is an obstacle");
            return PathResult::failure(0);
        }

        let width = map.width();
        let cells = map.grid().len();
        let coords = |index: usize| -> (i32, i32) {
            (map.lower_x() + (index % width) as i32, map.lower_y() + (index / width) as i32)
        };
        let target = (goal.x(), goal.y());

        let mut g_score = vec![u64::MAX; cells];
        let mut came_from: Vec<Option<usize>> = vec![None; cells];
        let mut closed = vec![false; cells];
        let mut open_set = BinaryHeap::new();
        let mut seq = 0u64;
        let mut nodes_explored = 0usize;

        g_score[start_index] = 0;
        open_set.push(State { f: self.kind.heuristic(coords(start_index), target), seq, index: start_index });

        while let Some(State { index: current, .. }) = open_set.pop() {
            if closed[current] {
                continue;
            }
            closed[current] = true;
            nodes_explored += 1;

            if current == goal_index {
                let path = reconstruct_path(&came_from, current, |i| {
                    let (x, y) = coords(i);
                    CostMapPose::new(x, y, map.resolution())
                });
                debug!(kind = %self.kind, length = path.len(), nodes_explored, "Path found");
                return PathResult::success(path, g_score[current], nodes_explored);
            }

            let (cx, cy) = coords(current);
            for &(dx, dy) in NEIGHBOR_OFFSETS.iter() {
                let Some(next) = map.index(cx + dx, cy + dy) else {
                    continue;
                };
                let cost = map.grid()[next];
                if closed[next] || is_obstacle(cost) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { DIAGONAL_STEP } else { AXIS_STEP };
                let tentative = g_score[current] + (cost as u64 + 1) * step;
                if tentative < g_score[next] {
                    g_score[next] = tentative;
                    came_from[next] = Some(current);
                    seq += 1;
                    let f = tentative + self.kind.heuristic((cx + dx, cy + dy), target);
                    open_set.push(State { f, seq, index: next });
                }
            }
        }

        debug!(kind = %self.kind, %start, %goal, nodes_explored, "No path found");
        PathResult::failure(nodes_explored)
    }
}

impl PathFinder for GridPathFinder {
    fn set_cost_map(&mut self, map: Arc<CostMap>) {
        self.map = Some(map);
    }

    fn compute_plan(&self, start: &CostMapPose, goal: &CostMapPose) -> Option<Path<CostMapPose>> {
        self.compute_plan_detailed(start, goal).into_path()
    }
}

fn reconstruct_path<F>(came_from: &[Option<usize>], mut current: usize, to_pose: F) -> Path<CostMapPose>
where
    F: Fn(usize) -> CostMapPose,
{
    let mut steps = vec![to_pose(current)];
    while let Some(previous) = came_from[current] {
        steps.push(to_pose(previous));
        current = previous;
    }
    steps.reverse();
    Path::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{FREE_COST, OBSTACLE_COST, Source};

    fn finder(kind: SearchKind, map: CostMap) -> GridPathFinder {
        let mut finder = GridPathFinder::new(kind);
        finder.set_cost_map(Arc::new(map.into_published()));
        finder
    }

    fn free_grid(size: usize) -> CostMap {
        CostMap::filled(Source::StaticMap, 1.0, (0, 0), size, size, FREE_COST).unwrap()
    }

    fn pose(x: i32, y: i32) -> CostMapPose {
        CostMapPose::new(x, y, 1.0)
    }

    fn cells(path: &Path<CostMapPose>) -> Vec<(i32, i32)> {
        path.iter().map(|p| (p.x(), p.y())).collect()
    }

    #[test]
    fn test_straight_column() {
        for kind in [SearchKind::AStar, SearchKind::Dijkstra] {
            let path = finder(kind, free_grid(4)).compute_plan(&pose(0, 0), &pose(0, 3)).unwrap();
            assert_eq!(cells(&path), vec![(0, 0), (0, 1), (0, 2), (0, 3)], "{}", kind);
        }
    }

    #[test]
    fn test_diagonal() {
        for kind in [SearchKind::AStar, SearchKind::Dijkstra] {
            let path = finder(kind, free_grid(4)).compute_plan(&pose(0, 0), &pose(3, 3)).unwrap();
            assert_eq!(cells(&path), vec![(0, 0), (1, 1), (2, 2), (3, 3)], "{}", kind);
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let planner = finder(SearchKind::AStar, free_grid(4));
        assert!(planner.compute_plan(&pose(-1, 0), &pose(3, 3)).is_none());
        assert!(planner.compute_plan(&pose(0, 0), &pose(4, 0)).is_none());
        assert!(GridPathFinder::astar().compute_plan(&pose(0, 0), &pose(1, 1)).is_none());
    }

    #[test]
    fn test_wall_blocks_and_gap_restores() {
        let mut map = free_grid(4);
        for x in 0..4 {
            map.set_cost(x, 2, OBSTACLE_COST).unwrap();
        }
        for kind in [SearchKind::AStar, SearchKind::Dijkstra] {
            assert!(finder(kind, map.clone()).compute_plan(&pose(0, 0), &pose(0, 3)).is_none());
        }

        map.set_cost(2, 2, FREE_COST).unwrap();
        for kind in [SearchKind::AStar, SearchKind::Dijkstra] {
            let path = finder(kind, map.clone()).compute_plan(&pose(0, 0), &pose(0, 3)).unwrap();
            assert_eq!(path.first(), Some(&pose(0, 0)));
            assert_eq!(path.last(), Some(&pose(0, 3)));
            assert!(path.iter().any(|p| *p == pose(2, 2)));
        }
    }

    #[test]
    fn test_obstacle_endpoint() {
        let mut map = free_grid(3);
        map.set_cost(2, 2, OBSTACLE_COST).unwrap();
        let planner = finder(SearchKind::Dijkstra, map);
        assert!(planner.compute_plan(&pose(2, 2), &pose(0, 0)).is_none());
        assert!(planner.compute_plan(&pose(0, 0), &pose(2, 2)).is_none());
    }

    #[test]
    fn test_same_start_and_goal() {
        let path = finder(SearchKind::AStar, free_grid(3)).compute_plan(&pose(1, 1), &pose(1, 1)).unwrap();
        assert_eq!(cells(&path), vec![(1, 1)]);
    }

    #[test]
    fn test_avoids_expensive_cells() {
        let mut map = free_grid(3);
        map.set_cost(1, 1, 100).unwrap();
        let path = finder(SearchKind::AStar, map).compute_plan(&pose(0, 1), &pose(2, 1)).unwrap();
        assert!(!path.iter().any(|p| *p == pose(1, 1)));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_offset_map() {
        let map = CostMap::filled(Source::StaticMap, 0.5, (-3, 5), 4, 4, FREE_COST).unwrap();
        let path = finder(SearchKind::AStar, map)
            .compute_plan(&CostMapPose::new(-3, 5, 0.5), &CostMapPose::new(0, 5, 0.5))
            .unwrap();
        assert_eq!(cells(&path), vec![(-3, 5), (-2, 5), (-1, 5), (0, 5)]);
        assert_eq!(path[0].resolution(), 0.5);
    }

    #[test]
    fn test_detailed_result() {
        let result = finder(SearchKind::AStar, free_grid(4)).compute_plan_detailed(&pose(0, 0), &pose(0, 3));
        assert!(result.is_success());
        assert_eq!(result.total_cost, Some(30));
        assert_eq!(
            format!("{}", result),
            format!("PathResult {{ success: true, path_length: 4, total_cost: 30, nodes_explored: {} }}", result.nodes_explored)
        );
        let dijkstra = finder(SearchKind::Dijkstra, free_grid(4)).compute_plan_detailed(&pose(0, 0), &pose(0, 3));
        assert!(dijkstra.nodes_explored >= result.nodes_explored);

        let blocked = finder(SearchKind::AStar, free_grid(4)).compute_plan_detailed(&pose(0, 0), &pose(9, 9));
        assert_eq!(format!("{}", blocked), "PathResult { success: false, nodes_explored: 0 }");
    }

    #[test]
    fn test_octile_distance() {
        assert_eq!(octile_distance((0, 0), (3, 3)), 42);
        assert_eq!(octile_distance((0, 0), (0, 3)), 30);
        assert_eq!(octile_distance((0, 0), (3, 1)), 34);
    }
}
