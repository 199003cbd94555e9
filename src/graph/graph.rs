use super::edge::{Edge, EdgeId};
use super::vertex::{Vertex, VertexId};
use crate::io::TokenReader;
use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

/// Handle value meaning "no element".
pub(super) const ABSENT: usize = 0;

/// An undirected weighted graph stored as an arena of vertices and edges.
///
/// Vertices and edges live in dense, 1-based handle slots (slot 0 is the
/// absent sentinel). Two plain indexed arrays map caller-facing ids to
/// handles; edges additionally keep the reverse handle → id array. All
/// other structures (adjacency list, adjacency matrix) refer to handles.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(super) vertices: Vec<Option<Vertex>>,
    pub(super) edges: Vec<Option<Edge>>,
    pub(super) edge_ids: Vec<EdgeId>,
    vertex_handles: Vec<usize>,
    edge_handles: Vec<usize>,
    /// vertex handle -> (neighbour handle, edge handle)
    pub(super) adjacency: Vec<Vec<(usize, usize)>>,
    /// Sparse adjacency matrix: ordered vertex handle pair -> edge handle
    adjacency_matrix: HashMap<(usize, usize), usize>,
    num_vertices: usize,
    num_edges: usize,
    max_vertex_id: Option<VertexId>,
    max_edge_id: Option<EdgeId>,
    total_vertex_weight: f64,
    total_edge_weight: f64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn matrix_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            vertices: vec![None],
            edges: vec![None],
            edge_ids: vec![0],
            vertex_handles: Vec::new(),
            edge_handles: Vec::new(),
            adjacency: vec![Vec::new()],
            adjacency_matrix: HashMap::new(),
            num_vertices: 0,
            num_edges: 0,
            max_vertex_id: None,
            max_edge_id: None,
            total_vertex_weight: 0.0,
            total_edge_weight: 0.0,
        }
    }

    #[inline] pub fn num_vertices(&self) -> usize { self.num_vertices }

    #[inline] pub fn num_edges(&self) -> usize { self.num_edges }

    #[inline] pub fn is_empty(&self) -> bool { self.num_vertices == 0 }

    /// Largest vertex id currently stored.
    #[inline] pub fn max_vertex_id(&self) -> Option<VertexId> { self.max_vertex_id }

    /// Largest edge id currently stored.
    #[inline] pub fn max_edge_id(&self) -> Option<EdgeId> { self.max_edge_id }

    #[inline] pub fn total_vertex_weight(&self) -> f64 { self.total_vertex_weight }

    #[inline] pub fn total_edge_weight(&self) -> f64 { self.total_edge_weight }

    #[inline]
    pub(super) fn vertex_handle(&self, id: VertexId) -> Option<usize> {
        self.vertex_handles.get(id).copied().filter(|&h| h != ABSENT)
    }

    #[inline]
    pub(super) fn edge_handle(&self, id: EdgeId) -> Option<usize> {
        self.edge_handles.get(id).copied().filter(|&h| h != ABSENT)
    }

    /// Handles of the live vertices, in insertion order.
    pub(super) fn vertex_handles(&self) -> impl Iterator<Item = usize> + '_ {
        (1..self.vertices.len()).filter(move |&h| self.vertices[h].is_some())
    }

    /// Handles of the live edges, in insertion order.
    pub(super) fn edge_handles(&self) -> impl Iterator<Item = usize> + '_ {
        (1..self.edges.len()).filter(move |&h| self.edges[h].is_some())
    }

    #[inline]
    pub(super) fn vertex_at(&self, handle: usize) -> &Vertex {
        self.vertices[handle].as_ref().expect("live vertex handle")
    }

    #[inline]
    pub(super) fn edge_at(&self, handle: usize) -> &Edge {
        self.edges[handle].as_ref().expect("live edge handle")
    }

    pub fn has_vertex(&self, id: VertexId) -> bool {
        self.vertex_handle(id).is_some()
    }

    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.edge_handle(id).is_some()
    }

    /// The canonical stored vertex with the given id.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertex_handle(id).map(|h| self.vertex_at(h))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_handle(id).map(|h| self.edge_at(h))
    }

    /// Weight of an edge, 0 if the edge is absent.
    pub fn edge_weight(&self, id: EdgeId) -> f64 {
        self.edge(id).map(|e| e.weight()).unwrap_or(0.0)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices.iter().flatten()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices().map(|v| v.id)
    }

    /// `(id, edge)` pairs in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edge_handles().map(move |h| (self.edge_ids[h], self.edge_at(h)))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_handles().map(move |h| self.edge_ids[h])
    }

    /// Id of the edge joining `u` and `v`, if any.
    pub fn edge_between(&self, u: VertexId, v: VertexId) -> Option<EdgeId> {
        let hu = self.vertex_handle(u)?;
        let hv = self.vertex_handle(v)?;
        self.adjacency_matrix.get(&matrix_key(hu, hv)).map(|&h| self.edge_ids[h])
    }

    pub fn degree(&self, id: VertexId) -> usize {
        self.vertex_handle(id).map(|h| self.adjacency[h].len()).unwrap_or(0)
    }

    /// Insert a vertex under its own id. Fails on a duplicate id.
    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        if self.has_vertex(vertex.id) {
            return false;
        }

        let handle = self.vertices.len();
        self.vertices.push(Some(vertex));
        self.adjacency.push(Vec::new());
        if self.vertex_handles.len() <= vertex.id {
            self.vertex_handles.resize(vertex.id + 1, ABSENT);
        }
        self.vertex_handles[vertex.id] = handle;

        self.num_vertices += 1;
        self.total_vertex_weight += vertex.weight;
        self.max_vertex_id = Some(self.max_vertex_id.map_or(vertex.id, |m| m.max(vertex.id)));
        true
    }

    /// Insert an edge between two stored vertices under the next free id.
    pub fn add_edge(&mut self, u: VertexId, v: VertexId, weight: f64) -> bool {
        let id = self.max_edge_id.map_or(0, |m| m + 1);
        self.add_edge_with_id(id, u, v, weight)
    }

    /// Insert an edge with an explicit id.
    ///
    /// Fails when the id is taken, an endpoint is missing, the endpoints
    /// coincide, or the pair is already joined by another edge.
    pub fn add_edge_with_id(&mut self, id: EdgeId, u: VertexId, v: VertexId, weight: f64) -> bool {
        if self.has_edge(id) || u == v {
            return false;
        }
        let (Some(hu), Some(hv)) = (self.vertex_handle(u), self.vertex_handle(v)) else {
            return false;
        };
        let key = matrix_key(hu, hv);
        if self.adjacency_matrix.contains_key(&key) {
            return false;
        }

        let edge = Edge::new(*self.vertex_at(hu), *self.vertex_at(hv), weight);
        let handle = self.edges.len();
        self.edges.push(Some(edge));
        self.edge_ids.push(id);
        if self.edge_handles.len() <= id {
            self.edge_handles.resize(id + 1, ABSENT);
        }
        self.edge_handles[id] = handle;

        self.adjacency[hu].push((hv, handle));
        self.adjacency[hv].push((hu, handle));
        self.adjacency_matrix.insert(key, handle);

        self.num_edges += 1;
        self.total_edge_weight += weight;
        self.max_edge_id = Some(self.max_edge_id.map_or(id, |m| m.max(id)));
        true
    }

    /// Remove an edge by id.
    pub fn remove_edge(&mut self, id: EdgeId) -> bool {
        let Some(handle) = self.edge_handle(id) else {
            return false;
        };
        let Some(edge) = self.edges[handle].take() else {
            return false;
        };
        let (u, v) = edge.endpoints();
        let hu = self.vertex_handles[u];
        let hv = self.vertex_handles[v];

        self.adjacency[hu].retain(|&(_, eh)| eh != handle);
        self.adjacency[hv].retain(|&(_, eh)| eh != handle);
        self.adjacency_matrix.remove(&matrix_key(hu, hv));
        self.edge_handles[id] = ABSENT;

        self.num_edges -= 1;
        self.total_edge_weight -= edge.weight();
        if self.max_edge_id == Some(id) {
            self.max_edge_id = self.edge_handles.iter().rposition(|&h| h != ABSENT);
        }
        true
    }

    /// Remove a vertex and every edge incident to it.
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        let Some(handle) = self.vertex_handle(id) else {
            return false;
        };
        let incident: Vec<EdgeId> = self.adjacency[handle].iter()
            .map(|&(_, eh)| self.edge_ids[eh])
            .collect();
        for edge_id in incident {
            self.remove_edge(edge_id);
        }

        let Some(vertex) = self.vertices[handle].take() else {
            return false;
        };
        self.vertex_handles[id] = ABSENT;
        self.num_vertices -= 1;
        self.total_vertex_weight -= vertex.weight;
        if self.max_vertex_id == Some(id) {
            self.max_vertex_id = self.vertex_handles.iter().rposition(|&h| h != ABSENT);
        }
        true
    }

    /// Ids of the edges incident to `v`.
    pub fn incident_edges(&self, v: VertexId) -> Vec<EdgeId> {
        self.vertex_handle(v)
            .map(|h| self.adjacency[h].iter().map(|&(_, eh)| self.edge_ids[eh]).collect())
            .unwrap_or_default()
    }

    /// Ids of the vertices adjacent to `v`.
    pub fn adjacent_vertices(&self, v: VertexId) -> Vec<VertexId> {
        self.vertex_handle(v)
            .map(|h| self.adjacency[h].iter().map(|&(nh, _)| self.vertex_at(nh).id).collect())
            .unwrap_or_default()
    }

    /// Ids of the edges sharing an endpoint with `e` (excluding `e`), sorted.
    pub fn adjacent_edges(&self, e: EdgeId) -> Vec<EdgeId> {
        let Some(edge) = self.edge(e) else {
            return Vec::new();
        };
        let (u, v) = edge.endpoints();
        let mut adjacent: Vec<EdgeId> = self.incident_edges(u).into_iter()
            .chain(self.incident_edges(v))
            .filter(|&f| f != e)
            .collect();
        adjacent.sort_unstable();
        adjacent.dedup();
        adjacent
    }

    /// Edges adjacent to at least one member of `edges`, excluding the members.
    pub fn adjacent_edges_of(&self, edges: &BTreeSet<EdgeId>) -> BTreeSet<EdgeId> {
        edges.iter()
            .flat_map(|&e| self.adjacent_edges(e))
            .filter(|f| !edges.contains(f))
            .collect()
    }

    /// Parse a graph stream: `V E`, then `V` lines `x y`, then `E` lines `u v w`.
    /// Vertex ids are `0..V` in order, edge ids `0..E` in order.
    pub(crate) fn read_tokens(reader: &mut TokenReader<'_>) -> Result<Graph> {
        let num_vertices: usize = reader.parse("vertex count")?;
        let num_edges: usize = reader.parse("edge count")?;

        let mut graph = Graph::new();
        for id in 0..num_vertices {
            let x: f64 = reader.parse("vertex x coordinate")?;
            let y: f64 = reader.parse("vertex y coordinate")?;
            graph.add_vertex(Vertex::new(id, x, y, 0.0));
        }

        for id in 0..num_edges {
            let u: VertexId = reader.parse("edge endpoint")?;
            let v: VertexId = reader.parse("edge endpoint")?;
            let w: f64 = reader.parse("edge weight")?;
            if !graph.add_edge_with_id(id, u, v, w) {
                bail!("edge #{} ({} {}) is a duplicate, a loop or references a missing vertex", id, u, v);
            }
        }

        Ok(graph)
    }

    /// Parse a graph from the textual stream format.
    pub fn parse(input: &str) -> Result<Graph> {
        let mut reader = TokenReader::new(input);
        Self::read_tokens(&mut reader)
    }

    /// Serialize to the textual stream format. Vertices and edges are
    /// written in insertion order, which reproduces the ids of a graph read
    /// with [`Graph::parse`].
    pub fn to_stream(&self) -> String {
        let mut out = String::new();
        let positions: HashMap<VertexId, usize> = self.vertex_ids()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();

        let _ = writeln!(out, "{} {}", self.num_vertices, self.num_edges);
        for v in self.vertices() {
            let _ = writeln!(out, "{} {}", v.x, v.y);
        }
        for (_, e) in self.edges() {
            let (u, v) = e.endpoints();
            let _ = writeln!(out, "{} {} {}", positions[&u], positions[&v], e.weight());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_tail() -> Graph {
        // 0 - 1
        // |   |
        // 3 - 2 - 4
        let mut graph = Graph::new();
        for id in 0..5 {
            graph.add_vertex(Vertex::new(id, id as f64, 0.0, 0.0));
        }
        graph.add_edge(0, 1, 1.0);
        graph.add_edge(1, 2, 2.0);
        graph.add_edge(2, 3, 3.0);
        graph.add_edge(3, 0, 4.0);
        graph.add_edge(2, 4, 5.0);
        graph
    }

    #[test]
    fn test_add_and_query() {
        let graph = square_with_tail();
        assert_eq!(graph.num_vertices(), 5);
        assert_eq!(graph.num_edges(), 5);
        assert_eq!(graph.max_edge_id(), Some(4));
        assert!((graph.total_edge_weight() - 15.0).abs() < 1e-12);

        assert_eq!(graph.degree(2), 3);
        assert_eq!(graph.edge_between(3, 0), Some(3));
        assert_eq!(graph.edge_between(0, 3), Some(3));
        assert_eq!(graph.edge_between(0, 2), None);

        let mut incident = graph.incident_edges(2);
        incident.sort_unstable();
        assert_eq!(incident, vec![1, 2, 4]);

        let mut neighbours = graph.adjacent_vertices(0);
        neighbours.sort_unstable();
        assert_eq!(neighbours, vec![1, 3]);

        assert_eq!(graph.adjacent_edges(1), vec![0, 2, 4]);
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut graph = square_with_tail();
        assert!(!graph.add_vertex(Vertex::new(0, 9.0, 9.0, 0.0)));
        assert!(!graph.add_edge(1, 0, 7.0));
        assert!(!graph.add_edge(0, 0, 1.0));
        assert!(!graph.add_edge(0, 42, 1.0));
        assert!(!graph.add_edge_with_id(2, 0, 4, 1.0));
        assert_eq!(graph.num_edges(), 5);
    }

    #[test]
    fn test_adjacent_edges_of_set_excludes_members() {
        let graph = square_with_tail();
        let set: BTreeSet<EdgeId> = [0, 1].into_iter().collect();
        let adjacent = graph.adjacent_edges_of(&set);
        assert_eq!(adjacent.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_remove_edge_and_vertex_keep_trackers() {
        let mut graph = square_with_tail();
        assert!(graph.remove_edge(4));
        assert!(!graph.remove_edge(4));
        assert_eq!(graph.max_edge_id(), Some(3));
        assert_eq!(graph.degree(2), 2);
        assert_eq!(graph.edge_between(2, 4), None);

        assert!(graph.remove_vertex(4));
        assert_eq!(graph.max_vertex_id(), Some(3));

        assert!(graph.remove_vertex(0));
        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.degree(1), 1);
        assert!((graph.total_edge_weight() - 5.0).abs() < 1e-12);

        // The freed id can be reused
        assert!(graph.add_vertex(Vertex::new(0, 0.0, 0.0, 0.0)));
        assert!(graph.add_edge_with_id(3, 0, 3, 4.0));
        assert_eq!(graph.edge_between(3, 0), Some(3));
    }

    #[test]
    fn test_stream_round_trip() {
        let input = "3 2\n0 0\n1 0\n2 0\n0 1 1.5\n1 2 2\n";
        let graph = Graph::parse(input).unwrap();
        assert_eq!(graph.num_vertices(), 3);
        assert_eq!(graph.edge(1).unwrap().endpoints(), (1, 2));

        let reparsed = Graph::parse(&graph.to_stream()).unwrap();
        assert_eq!(reparsed.num_edges(), 2);
        assert_eq!(reparsed.edge(0), graph.edge(0));
    }

    #[test]
    fn test_parse_rejects_bad_edge() {
        assert!(Graph::parse("2 1\n0 0\n1 1\n0 5 1\n").is_err());
        assert!(Graph::parse("2 1\n0 0\n1 1\n").is_err());
    }
}
