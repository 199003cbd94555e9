use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Caller-facing vertex identifier.
pub type VertexId = usize;

/// A vertex of the road/street graph.
///
/// Equality and ordering are lexicographic on `(id, x, y, weight)`, so a
/// vertex rebuilt from its id alone is *not* equal to the stored one.
/// Look the canonical vertex up through [`crate::graph::Graph::vertex`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub x: f64,
    pub y: f64,
    /// Non-negative demand weight
    pub weight: f64,
}

impl Vertex {
    pub fn new(id: VertexId, x: f64, y: f64, weight: f64) -> Self {
        Vertex { id, x, y, weight }
    }

    #[inline]
    fn key(&self) -> (VertexId, OrderedFloat<f64>, OrderedFloat<f64>, OrderedFloat<f64>) {
        (self.id, OrderedFloat(self.x), OrderedFloat(self.y), OrderedFloat(self.weight))
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Vertex {}

impl PartialOrd for Vertex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vertex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} ({}, {})", self.id, self.x, self.y)
    }
}
