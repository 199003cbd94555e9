//! Graph algorithms: induced subgraphs, connectivity, connected components,
//! bridges, leaf edges, minimum spanning tree and line graph.
//!
//! Depth-first traversals use an explicit stack so that long paths in
//! large instances cannot exhaust the call stack.

use super::edge::EdgeId;
use super::graph::Graph;
use super::vertex::{Vertex, VertexId};
use crate::disjoint_set::DisjointSet;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, VecDeque};

/// Discovery-time sentinel for vertices not yet reached by the DFS.
const UNVISITED: usize = usize::MAX;

impl Graph {
    /// Subgraph induced by a set of vertex ids. Ids are preserved; unknown
    /// ids are ignored. Edges are kept when both endpoints are selected.
    pub fn induced_subgraph_from_vertices<I>(&self, vertices: I) -> Graph
    where
        I: IntoIterator<Item = VertexId>,
    {
        let mut sub = Graph::new();
        for id in vertices {
            if let Some(v) = self.vertex(id) {
                sub.add_vertex(*v);
            }
        }
        for (id, e) in self.edges() {
            let (u, v) = e.endpoints();
            if sub.has_vertex(u) && sub.has_vertex(v) {
                sub.add_edge_with_id(id, u, v, e.weight());
            }
        }
        sub
    }

    /// Subgraph induced by a set of edge ids: the edges plus their endpoints.
    pub fn induced_subgraph_from_edges<I>(&self, edges: I) -> Graph
    where
        I: IntoIterator<Item = EdgeId>,
    {
        let mut sub = Graph::new();
        for id in edges {
            let Some(e) = self.edge(id) else {
                continue;
            };
            sub.add_vertex(*e.u());
            sub.add_vertex(*e.v());
            let (u, v) = e.endpoints();
            sub.add_edge_with_id(id, u, v, e.weight());
        }
        sub
    }

    /// Breadth-first connectivity test. The empty graph counts as connected.
    pub fn is_connected(&self) -> bool {
        let Some(start) = self.vertex_handles().next() else {
            return true;
        };

        let mut visited = vec![false; self.vertices.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);
        let mut reached = 1;

        while let Some(h) = queue.pop_front() {
            for &(nh, _) in &self.adjacency[h] {
                if !visited[nh] {
                    visited[nh] = true;
                    reached += 1;
                    queue.push_back(nh);
                }
            }
        }

        reached == self.num_vertices()
    }

    /// Vertex handles of each connected component, in discovery order.
    fn component_handles(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.vertices.len()];
        let mut components = Vec::new();

        for root in self.vertex_handles() {
            if visited[root] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![root];
            visited[root] = true;
            while let Some(h) = stack.pop() {
                component.push(h);
                for &(nh, _) in &self.adjacency[h] {
                    if !visited[nh] {
                        visited[nh] = true;
                        stack.push(nh);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// One induced subgraph per connected component.
    pub fn connected_components(&self) -> Vec<Graph> {
        self.component_handles()
            .into_iter()
            .map(|mut handles| {
                handles.sort_unstable();
                let ids: Vec<VertexId> = handles.iter().map(|&h| self.vertex_at(h).id).collect();
                self.induced_subgraph_from_vertices(ids)
            })
            .collect()
    }

    /// Bridges found by Tarjan's low-link DFS, run once per component.
    ///
    /// Tree edge `{p, c}` is a bridge iff `low[c] > disc[p]`, i.e. the subtree
    /// rooted at `c` has no back edge reaching `p` or an ancestor of `p`.
    pub fn bridges(&self) -> BTreeSet<EdgeId> {
        let n = self.vertices.len();
        let mut disc = vec![UNVISITED; n];
        let mut low = vec![UNVISITED; n];
        let mut timer = 0;
        let mut bridges = BTreeSet::new();

        // (vertex handle, handle of the tree edge used to reach it, next neighbour index)
        let mut stack: Vec<(usize, usize, usize)> = Vec::new();

        for root in self.vertex_handles() {
            if disc[root] != UNVISITED {
                continue;
            }
            disc[root] = timer;
            low[root] = timer;
            timer += 1;
            stack.push((root, 0, 0));

            while let Some(frame) = stack.last_mut() {
                let (v, parent_edge, next) = *frame;
                if next < self.adjacency[v].len() {
                    frame.2 += 1;
                    let (w, eh) = self.adjacency[v][next];
                    if eh == parent_edge {
                        continue;
                    }
                    if disc[w] == UNVISITED {
                        disc[w] = timer;
                        low[w] = timer;
                        timer += 1;
                        stack.push((w, eh, 0));
                    } else {
                        low[v] = low[v].min(disc[w]);
                    }
                } else {
                    stack.pop();
                    if let Some(&(p, _, _)) = stack.last() {
                        low[p] = low[p].min(low[v]);
                        if low[v] > disc[p] {
                            bridges.insert(self.edge_ids[parent_edge]);
                        }
                    }
                }
            }
        }

        bridges
    }

    /// Edges with at least one endpoint of degree 1.
    pub fn leaf_edges(&self) -> BTreeSet<EdgeId> {
        self.edges()
            .filter(|(_, e)| {
                let (u, v) = e.endpoints();
                self.degree(u) == 1 || self.degree(v) == 1
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Bridges whose removal would strand more than a single leaf vertex.
    pub fn non_leaf_bridges(&self) -> BTreeSet<EdgeId> {
        let leaves = self.leaf_edges();
        self.bridges().into_iter().filter(|e| !leaves.contains(e)).collect()
    }

    /// Kruskal's minimum spanning tree (a forest on disconnected input).
    /// Edges of equal weight are taken in insertion order.
    pub fn minimum_spanning_tree(&self) -> Graph {
        let mut tree = Graph::new();
        for v in self.vertices() {
            tree.add_vertex(*v);
        }

        let mut order: Vec<usize> = self.edge_handles().collect();
        order.sort_by_key(|&h| OrderedFloat(self.edge_at(h).weight()));

        let mut sets = DisjointSet::new(self.vertices.len());
        for h in order {
            let e = self.edge_at(h);
            let (u, v) = e.endpoints();
            let (Some(hu), Some(hv)) = (self.vertex_handle(u), self.vertex_handle(v)) else {
                continue;
            };
            if sets.union(hu, hv) {
                tree.add_edge_with_id(self.edge_ids[h], u, v, e.weight());
            }
            if tree.num_edges() + 1 >= self.num_vertices() {
                break;
            }
        }

        tree
    }

    /// Line graph: one vertex per edge (id = edge id, weight = edge weight,
    /// placed at the edge midpoint), adjacent when the edges share an endpoint.
    /// Line-graph edges carry zero weight.
    pub fn line_graph(&self) -> Graph {
        let mut line = Graph::new();
        for (id, e) in self.edges() {
            let (x, y) = e.midpoint();
            line.add_vertex(Vertex::new(id, x, y, e.weight()));
        }

        for h in self.vertex_handles() {
            let incident = &self.adjacency[h];
            for (i, &(_, a)) in incident.iter().enumerate() {
                for &(_, b) in &incident[i + 1..] {
                    line.add_edge(self.edge_ids[a], self.edge_ids[b], 0.0);
                }
            }
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> Graph {
        let mut graph = Graph::new();
        for id in 0..n {
            graph.add_vertex(Vertex::new(id, id as f64, 0.0, 0.0));
        }
        for id in 0..n.saturating_sub(1) {
            graph.add_edge(id, id + 1, 1.0);
        }
        graph
    }

    fn two_triangles_joined() -> Graph {
        // Triangles {0,1,2} and {3,4,5} joined by the bridge 2-3, plus a pendant 5-6
        let mut graph = Graph::new();
        for id in 0..7 {
            graph.add_vertex(Vertex::new(id, 0.0, 0.0, 0.0));
        }
        graph.add_edge(0, 1, 1.0); // 0
        graph.add_edge(1, 2, 1.0); // 1
        graph.add_edge(2, 0, 1.0); // 2
        graph.add_edge(2, 3, 1.0); // 3 bridge
        graph.add_edge(3, 4, 1.0); // 4
        graph.add_edge(4, 5, 1.0); // 5
        graph.add_edge(5, 3, 1.0); // 6
        graph.add_edge(5, 6, 1.0); // 7 bridge + leaf
        graph
    }

    #[test]
    fn test_connectivity() {
        assert!(Graph::new().is_connected());
        assert!(path(5).is_connected());

        let mut graph = path(5);
        graph.remove_edge(1);
        assert!(!graph.is_connected());
        assert_eq!(graph.connected_components().len(), 2);
    }

    #[test]
    fn test_connected_components_preserve_ids() {
        let mut graph = two_triangles_joined();
        graph.remove_edge(3);
        let components = graph.connected_components();
        assert_eq!(components.len(), 2);

        let first: Vec<EdgeId> = components[0].edge_ids().collect();
        let second: Vec<EdgeId> = components[1].edge_ids().collect();
        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(second, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_bridges() {
        let graph = two_triangles_joined();
        let bridges: Vec<EdgeId> = graph.bridges().into_iter().collect();
        assert_eq!(bridges, vec![3, 7]);

        let leaves: Vec<EdgeId> = graph.leaf_edges().into_iter().collect();
        assert_eq!(leaves, vec![7]);

        let unsafe_edges: Vec<EdgeId> = graph.non_leaf_bridges().into_iter().collect();
        assert_eq!(unsafe_edges, vec![3]);
    }

    #[test]
    fn test_bridges_on_cycle_and_disconnected_input() {
        let mut cycle = path(4);
        cycle.add_edge(3, 0, 1.0);
        assert!(cycle.bridges().is_empty());

        // Two separate paths: every edge is a bridge in each component
        let mut graph = path(3);
        graph.add_vertex(Vertex::new(10, 0.0, 0.0, 0.0));
        graph.add_vertex(Vertex::new(11, 0.0, 0.0, 0.0));
        graph.add_edge(10, 11, 1.0);
        assert_eq!(graph.bridges().len(), 3);
    }

    #[test]
    fn test_path_bridges_are_leaves_or_interior() {
        let graph = path(2);
        assert_eq!(graph.bridges(), graph.leaf_edges());
        assert!(graph.non_leaf_bridges().is_empty());

        let graph = path(3);
        assert_eq!(graph.bridges(), graph.leaf_edges());
        assert!(graph.non_leaf_bridges().is_empty());

        // Longer paths have interior bridges that are unsafe to remove
        let graph = path(5);
        assert_eq!(graph.bridges().len(), 4);
        assert_eq!(graph.non_leaf_bridges().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_deep_path_does_not_overflow() {
        let graph = path(200_000);
        assert!(graph.is_connected());
        assert_eq!(graph.bridges().len(), 199_999);
    }

    #[test]
    fn test_induced_subgraphs() {
        let graph = two_triangles_joined();
        let sub = graph.induced_subgraph_from_vertices([0, 1, 2, 3]);
        assert_eq!(sub.num_vertices(), 4);
        assert_eq!(sub.edge_ids().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let sub = graph.induced_subgraph_from_edges([4, 7]);
        assert_eq!(sub.num_vertices(), 4);
        assert_eq!(sub.num_edges(), 2);
        assert!(!sub.is_connected());
        assert_eq!(sub.edge(7).map(|e| e.endpoints()), Some((5, 6)));
    }

    #[test]
    fn test_minimum_spanning_tree() {
        let mut graph = Graph::new();
        for id in 0..4 {
            graph.add_vertex(Vertex::new(id, 0.0, 0.0, 0.0));
        }
        graph.add_edge(0, 1, 4.0);
        graph.add_edge(1, 2, 1.0);
        graph.add_edge(2, 3, 2.0);
        graph.add_edge(3, 0, 3.0);
        graph.add_edge(0, 2, 1.0);

        let tree = graph.minimum_spanning_tree();
        assert_eq!(tree.num_vertices(), 4);
        assert_eq!(tree.num_edges(), 3);
        assert!(tree.is_connected());
        assert!((tree.total_edge_weight() - 4.0).abs() < 1e-12);
        // Ties at weight 1 are both taken; then weight 2
        assert_eq!(tree.edge_ids().collect::<Vec<_>>(), vec![1, 4, 2]);
    }

    #[test]
    fn test_line_graph() {
        // Star with three leaves plus one pendant: 0-1, 0-2, 0-3, 3-4
        let mut graph = Graph::new();
        for id in 0..5 {
            graph.add_vertex(Vertex::new(id, id as f64, 0.0, 0.0));
        }
        graph.add_edge(0, 1, 1.0);
        graph.add_edge(0, 2, 2.0);
        graph.add_edge(0, 3, 3.0);
        graph.add_edge(3, 4, 4.0);

        let line = graph.line_graph();
        assert_eq!(line.num_vertices(), 4);
        // Triangle among 0,1,2 from the centre plus 2-3 through vertex 3
        assert_eq!(line.num_edges(), 4);
        assert!(line.edge_between(0, 1).is_some());
        assert!(line.edge_between(2, 3).is_some());
        assert!(line.edge_between(0, 3).is_none());
        assert!((line.vertex(3).unwrap().weight - 4.0).abs() < 1e-12);
    }
}
