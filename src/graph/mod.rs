//! Graph model: vertices, canonical edges, and an arena-backed graph with
//! the connectivity algorithms the districting heuristics rely on.

mod algorithms;
mod edge;
#[allow(clippy::module_inception)]
mod graph;
mod vertex;

pub use edge::{Edge, EdgeId};
pub use graph::Graph;
pub use vertex::{Vertex, VertexId};
