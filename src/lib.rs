//! Edge Districting Solver Library
//!
//! A reactive GRASP for the capacitated edge-districting problem: partition
//! the edges of a weighted graph into `m` connected districts whose demand
//! (twice their total edge weight) stays within a balance window, while
//! maximizing a district-dependent profit.
//!
//! # Features
//!
//! - Arena-backed graph with iterative connectivity, bridge and component
//!   algorithms
//! - Semi-greedy randomized construction
//! - Multi-stage repair pipeline (disconnection, over-capacity, under-balance,
//!   unallocated edges)
//! - Local search (Hungarian district relabeling and frontier relocation)
//! - Reactive GRASP driver with adaptive alpha probabilities
//! - Benchmarking and fixed-field statistics reports
//!
//! # Example
//!
//! ```no_run
//! use edge_districting::instance::Instance;
//! use edge_districting::heuristics::{GraspConfig, ReactiveGrasp};
//!
//! let instance = Instance::from_file("instance.txt").unwrap();
//! let config = GraspConfig { time_limit: 10.0, ..GraspConfig::default() };
//! let outcome = ReactiveGrasp::new(config).run(&instance);
//!
//! if let Some(best) = outcome.best {
//!     println!("Best value: {:.2}", best.value());
//! }
//! ```

pub mod benchmark;
pub mod disjoint_set;
pub mod graph;
pub mod heuristics;
pub mod instance;
mod io;
pub mod report;
pub mod solution;
pub mod statistics;

pub use graph::{Edge, EdgeId, Graph, Vertex, VertexId};
pub use instance::Instance;
pub use solution::Solution;
