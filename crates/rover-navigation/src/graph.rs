//! Waypoint graph.
//!
//! Nodes wrap a transform recorded while mapping the world and keep the
//! planar distance to every neighbour closer than the connection distance.
//! The graph is an arena: nodes are addressed by [`NodeId`], removed slots
//! stay vacant so ids held by a plan never point at a different node.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashSet, VecDeque};
use std::fmt;

use rover_geometry::Transform;
use tracing::{debug, warn};

use crate::error::NavigationError;
use crate::path::Path;

/// Handle of a node inside one [`NodeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A graph vertex: one waypoint and its close neighbours.
#[derive(Debug, Clone)]
pub struct PathNode {
    transform: Transform,
    close_distances: BTreeMap<NodeId, f64>,
}

impl PathNode {
    fn new(transform: Transform) -> Self {
        PathNode { transform, close_distances: BTreeMap::new() }
    }

    /// The waypoint.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Neighbours and their distances, ordered by id.
    pub fn close_distances(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.close_distances.iter().map(|(&id, &d)| (id, d))
    }

    /// Distance to `other` if it is a neighbour.
    pub fn close_distance(&self, other: NodeId) -> Option<f64> {
        self.close_distances.get(&other).copied()
    }

    /// Number of neighbours.
    pub fn close_count(&self) -> usize {
        self.close_distances.len()
    }
}

#[derive(Copy, Clone, PartialEq)]
struct Frontier {
    score: f64,
    node: NodeId,
}

impl Eq for Frontier {}

// Min-heap on score, lower id first on ties.
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Arena of [`PathNode`]s.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: Vec<Option<PathNode>>,
}

impl NodeGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph over `transforms`, connecting every pair closer than
    /// `connection_distance` (bidirectional, weighted by planar distance),
    /// then checks that every node is reachable.
    pub fn build(transforms: &[Transform], connection_distance: f64) -> Self {
        let mut graph = NodeGraph::new();
        let ids: Vec<NodeId> = transforms.iter().map(|tf| graph.add_node(*tf)).collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let distance = transforms[a.0].planar_distance_to(&transforms[b.0]);
                if distance < connection_distance {
                    // Distinct ids and a non-negative distance cannot fail.
                    let _ = graph.connect(a, b, distance);
                }
            }
        }
        debug!(nodes = graph.len(), "Computed node distances");
        graph.validate_connections();
        graph
    }

    /// Adds an unconnected node.
    pub fn add_node(&mut self, transform: Transform) -> NodeId {
        self.nodes.push(Some(PathNode::new(transform)));
        NodeId(self.nodes.len() - 1)
    }

    /// The node behind `id`, unless it was removed.
    pub fn node(&self, id: NodeId) -> Option<&PathNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// True if `id` is a live node of this graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Waypoint of a live node.
    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.node(id).map(PathNode::transform)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// True if the graph has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every live node in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut PathNode, NavigationError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(NavigationError::UnknownNode("Node is not part of this graph"))
    }

    /// Records `distance` from `from` to `to` (one direction only).
    ///
    /// # Errors
    /// * `SelfNeighbor` if `from == to`
    /// * `NegativeDistance` if `distance` is negative or NaN
    /// * `UnknownNode` if either id is not a live node
    pub fn put_close_distance(&mut self, from: NodeId, to: NodeId, distance: f64) -> Result<(), NavigationError> {
        if from == to {
            return Err(NavigationError::SelfNeighbor("A node cannot be its own neighbour"));
        }
        if !(distance >= 0.0) {
            return Err(NavigationError::NegativeDistance("Distance must be non-negative"));
        }
        if !self.contains(to) {
            return Err(NavigationError::UnknownNode("Neighbour is not part of this graph"));
        }
        self.node_mut(from)?.close_distances.insert(to, distance);
        Ok(())
    }

    /// Records `distance` in both directions.
    pub fn connect(&mut self, a: NodeId, b: NodeId, distance: f64) -> Result<(), NavigationError> {
        self.put_close_distance(a, b, distance)?;
        self.put_close_distance(b, a, distance)
    }

    /// Forgets `to` as a neighbour of `from`, returning the old distance.
    pub fn remove_close_distance(&mut self, from: NodeId, to: NodeId) -> Result<Option<f64>, NavigationError> {
        Ok(self.node_mut(from)?.close_distances.remove(&to))
    }

    /// Forgets every neighbour of `id` (one direction only).
    pub fn clear_close_distances(&mut self, id: NodeId) -> Result<(), NavigationError> {
        self.node_mut(id)?.close_distances.clear();
        Ok(())
    }

    /// Removes a node and every edge pointing at it. Returns its former
    /// neighbours.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, NavigationError> {
        let node = self
            .nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(NavigationError::UnknownNode("Node is not part of this graph"))?;
        let neighbours: Vec<NodeId> = node.close_distances.keys().copied().collect();
        for &n in &neighbours {
            if let Some(Some(other)) = self.nodes.get_mut(n.0) {
                other.close_distances.remove(&id);
            }
        }
        Ok(neighbours)
    }

    /// Connects `id` to every node closer than `connection_distance` and to
    /// every node in `force`, whatever its distance.
    pub fn connect_nearby(
        &mut self,
        id: NodeId,
        connection_distance: f64,
        force: &HashSet<NodeId>,
    ) -> Result<(), NavigationError> {
        let origin = *self
            .transform(id)
            .ok_or(NavigationError::UnknownNode("Node is not part of this graph"))?;
        let candidates: Vec<(NodeId, f64)> = self
            .ids()
            .filter(|&other| other != id)
            .filter_map(|other| {
                let distance = self.transform(other)?.planar_distance_to(&origin);
                (distance < connection_distance || force.contains(&other)).then_some((other, distance))
            })
            .collect();
        for (other, distance) in candidates {
            self.connect(id, other, distance)?;
        }
        Ok(())
    }

    /// Node whose waypoint is closest to `target` in the plane. Linear scan.
    pub fn closest_node(&self, target: &Transform) -> Option<NodeId> {
        self.ids()
            .filter_map(|id| Some((id, self.transform(id)?.planar_distance_to_squared(target))))
            .fold(None, |best: Option<(NodeId, f64)>, (id, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((id, d)),
            })
            .map(|(id, _)| id)
    }

    /// Nodes that cannot be reached from `root`, found by breadth-first search.
    pub fn unreachable_from(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        if self.contains(root) {
            visited.insert(root);
            queue.push_back(root);
        }
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.node(id) {
                for (next, _) in node.close_distances() {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        self.ids().filter(|id| !visited.contains(id)).collect()
    }

    /// Logs a warning for every node unreachable from the first live node.
    /// Returns true if the graph is connected.
    pub fn validate_connections(&self) -> bool {
        let Some(root) = self.ids().next() else {
            return true;
        };
        let unreachable = self.unreachable_from(root);
        for id in &unreachable {
            if let Some(tf) = self.transform(*id) {
                warn!(node = %id, position = %tf, "Path node is not connected to the graph");
            }
        }
        unreachable.is_empty()
    }

    /// Shortest node sequence from `current` to `target`, both included, by
    /// Dijkstra over the close distances. `None` if `target` is unreachable.
    pub fn plan(&self, current: NodeId, target: NodeId) -> Option<Path<NodeId>> {
        if !self.contains(current) || !self.contains(target) {
            return None;
        }
        let mut scores: Vec<f64> = vec![f64::INFINITY; self.nodes.len()];
        let mut previous: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut heap = BinaryHeap::new();
        scores[current.0] = 0.0;
        heap.push(Frontier { score: 0.0, node: current });

        while let Some(Frontier { score, node }) = heap.pop() {
            if score > scores[node.0] {
                continue;
            }
            if node == target {
                break;
            }
            let Some(path_node) = self.node(node) else {
                continue;
            };
            for (next, distance) in path_node.close_distances() {
                let candidate = score + distance;
                if candidate < scores[next.0] {
                    scores[next.0] = candidate;
                    previous[next.0] = Some(node);
                    heap.push(Frontier { score: candidate, node: next });
                }
            }
        }

        if scores[target.0].is_infinite() {
            debug!(%current, %target, "No route to target node");
            return None;
        }
        let mut steps = vec![target];
        let mut cursor = target;
        while let Some(prev) = previous[cursor.0] {
            steps.push(prev);
            cursor = prev;
        }
        steps.reverse();
        Some(Path::new(steps))
    }
}

/// Drops every transform closer than `pruning_distance` to the last kept one.
pub fn prune_transforms(transforms: &[Transform], pruning_distance: f64) -> Vec<Transform> {
    let threshold = pruning_distance * pruning_distance;
    let mut kept: Vec<Transform> = Vec::with_capacity(transforms.len());
    for tf in transforms {
        match kept.last() {
            Some(last) if last.planar_distance_to_squared(tf) < threshold => {}
            _ => kept.push(*tf),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn line(xs: &[f64]) -> Vec<Transform> {
        xs.iter().map(|&x| Transform::new(x, 0.0, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_rejects_self_and_negative() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(Transform::new(0.0, 0.0, 0.0, 0.0));
        let b = graph.add_node(Transform::new(1.0, 0.0, 0.0, 0.0));
        assert!(matches!(graph.put_close_distance(a, a, 1.0), Err(NavigationError::SelfNeighbor(_))));
        assert!(matches!(graph.put_close_distance(a, b, -0.1), Err(NavigationError::NegativeDistance(_))));
        assert!(matches!(graph.put_close_distance(a, b, f64::NAN), Err(NavigationError::NegativeDistance(_))));
        assert_eq!(graph.node(a).unwrap().close_count(), 0);
        graph.put_close_distance(a, b, 0.0).unwrap();
        assert_eq!(graph.node(a).unwrap().close_distance(b), Some(0.0));
        assert_eq!(graph.node(b).unwrap().close_count(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut graph = NodeGraph::build(&line(&[0.0, 0.3, 0.6]), 0.5);
        let ids: Vec<NodeId> = graph.ids().collect();
        assert_eq!(graph.remove_close_distance(ids[0], ids[1]).unwrap(), Some(0.3));
        assert_eq!(graph.remove_close_distance(ids[0], ids[1]).unwrap(), None);
        graph.clear_close_distances(ids[1]).unwrap();
        assert_eq!(graph.node(ids[1]).unwrap().close_count(), 0);
    }

    #[test]
    fn test_build_connects_close_pairs() {
        let graph = NodeGraph::build(&line(&[0.0, 0.4, 0.8, 3.0]), 0.5);
        let ids: Vec<NodeId> = graph.ids().collect();
        let first = graph.node(ids[0]).unwrap();
        assert!((first.close_distance(ids[1]).unwrap() - 0.4).abs() < EPSILON);
        assert_eq!(first.close_distance(ids[2]), None);
        assert_eq!(graph.node(ids[3]).unwrap().close_count(), 0);
        assert!(!graph.validate_connections());
        assert_eq!(graph.unreachable_from(ids[0]), vec![ids[3]]);
    }

    #[test]
    fn test_plan_shortest() {
        // Square diagonals fall under the connection distance.
        let tfs = vec![
            Transform::new(0.0, 0.0, 0.0, 0.0),
            Transform::new(0.4, 0.0, 0.0, 0.0),
            Transform::new(0.4, 0.4, 0.0, 0.0),
            Transform::new(0.0, 0.4, 0.0, 0.0),
            Transform::new(0.8, 0.4, 0.0, 0.0),
        ];
        let graph = NodeGraph::build(&tfs, 0.6);
        let ids: Vec<NodeId> = graph.ids().collect();
        let path = graph.plan(ids[0], ids[4]).unwrap();
        assert_eq!(path.first(), Some(&ids[0]));
        assert_eq!(path.last(), Some(&ids[4]));
        assert_eq!(path.len(), 3);

        assert_eq!(graph.plan(ids[2], ids[2]).unwrap().steps(), &[ids[2]]);
    }

    #[test]
    fn test_plan_unreachable() {
        let graph = NodeGraph::build(&line(&[0.0, 0.3, 5.0, 5.3]), 0.5);
        let ids: Vec<NodeId> = graph.ids().collect();
        assert!(graph.plan(ids[0], ids[3]).is_none());
        assert!(graph.plan(ids[2], ids[3]).is_some());
    }

    #[test]
    fn test_remove_node_detaches_edges() {
        let mut graph = NodeGraph::build(&line(&[0.0, 0.3, 0.6]), 0.5);
        let ids: Vec<NodeId> = graph.ids().collect();
        let former = graph.remove_node(ids[1]).unwrap();
        assert_eq!(former, vec![ids[0], ids[2]]);
        assert!(!graph.contains(ids[1]));
        assert_eq!(graph.node(ids[0]).unwrap().close_distance(ids[1]), None);
        assert_eq!(graph.len(), 2);
        assert!(graph.plan(ids[0], ids[2]).is_none());

        let extra = graph.add_node(Transform::new(0.3, 0.25, 0.0, 0.0));
        let force: HashSet<NodeId> = former.into_iter().collect();
        graph.connect_nearby(extra, 0.1, &force).unwrap();
        assert_eq!(graph.plan(ids[0], ids[2]).unwrap().len(), 3);
    }

    #[test]
    fn test_closest_node() {
        let graph = NodeGraph::build(&line(&[0.0, 1.0, 2.0]), 0.5);
        let id = graph.closest_node(&Transform::new(1.2, 0.3, 0.0, 0.0)).unwrap();
        assert_eq!(id.index(), 1);
        assert!(NodeGraph::new().closest_node(&Transform::default()).is_none());
    }

    #[test]
    fn test_prune_transforms() {
        let kept = prune_transforms(&line(&[0.0, 0.01, 0.04, 0.06, 0.1, 0.2]), 0.05);
        let xs: Vec<f64> = kept.iter().map(|t| t.x()).collect();
        assert_eq!(xs, vec![0.0, 0.06, 0.2]);
    }
}
