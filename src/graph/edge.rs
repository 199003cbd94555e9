use super::vertex::{Vertex, VertexId};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Caller-facing edge identifier.
pub type EdgeId = usize;

/// An undirected weighted edge.
///
/// The endpoints are always stored with the smaller vertex first, so
/// `Edge::new(u, v, w) == Edge::new(v, u, w)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    u: Vertex,
    v: Vertex,
    weight: f64,
}

impl Edge {
    pub fn new(a: Vertex, b: Vertex, weight: f64) -> Self {
        if b < a {
            Edge { u: b, v: a, weight }
        } else {
            Edge { u: a, v: b, weight }
        }
    }

    /// The smaller endpoint.
    #[inline] pub fn u(&self) -> &Vertex { &self.u }

    /// The larger endpoint.
    #[inline] pub fn v(&self) -> &Vertex { &self.v }

    #[inline] pub fn weight(&self) -> f64 { self.weight }

    /// Endpoint ids in canonical order.
    #[inline]
    pub fn endpoints(&self) -> (VertexId, VertexId) {
        (self.u.id, self.v.id)
    }

    /// Midpoint of the two endpoints (used as coordinates in the line graph).
    pub fn midpoint(&self) -> (f64, f64) {
        ((self.u.x + self.v.x) / 2.0, (self.u.y + self.v.y) / 2.0)
    }

    #[inline]
    fn key(&self) -> (&Vertex, &Vertex, OrderedFloat<f64>) {
        (&self.u, &self.v, OrderedFloat(self.weight))
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Edge {}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.u.id, self.v.id, self.weight)
    }
}
