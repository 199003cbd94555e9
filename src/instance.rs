//! Module for parsing and representing edge-districting instances.
//!
//! An instance is a connected weighted graph together with the number of
//! districts `m`, a capacity `D`, a balance fraction `B` and a profit matrix
//! `c[edge][district]`. The per-district demand window is derived once:
//!
//! - `minimum_demand = max(0, (1 - B) * 2 * W / m)`
//! - `maximum_demand = min(D, (1 + B) * 2 * W / m)`
//!
//! where `W` is the total edge weight. Instances are immutable once built.

use crate::graph::{EdgeId, Graph, Vertex};
use crate::io::{read_file, write_file, TokenReader};
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Slack used when comparing accumulated floating-point demands against
/// the demand window.
pub const DEMAND_TOLERANCE: f64 = 1e-9;

/// Represents a complete edge-districting instance
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the instance (file stem when read from disk)
    pub name: String,
    graph: Graph,
    num_districts: usize,
    capacity: f64,
    balance: f64,
    /// profits[e][j]
    profits: Vec<Vec<f64>>,
    minimum_demand: f64,
    maximum_demand: f64,
    edge_weights: Vec<f64>,
    /// Edges sharing an endpoint with each edge, sorted
    edge_neighbors: Vec<Vec<EdgeId>>,
}

impl Instance {
    /// Build an instance. The graph's edge ids must be exactly `0..|E|`.
    pub fn new(graph: Graph, num_districts: usize, capacity: f64, balance: f64, profits: Vec<Vec<f64>>) -> Result<Self> {
        ensure!(num_districts > 0, "the number of districts must be positive");
        ensure!(balance >= 0.0, "the balance fraction must be non-negative (got {})", balance);
        ensure!(capacity >= 0.0, "the capacity must be non-negative (got {})", capacity);

        let num_edges = graph.num_edges();
        ensure!(
            graph.max_edge_id().map_or(0, |m| m + 1) == num_edges,
            "edge ids must be contiguous from 0 (|E| = {}, max id = {:?})", num_edges, graph.max_edge_id()
        );
        ensure!(profits.len() == num_edges, "expected {} profit rows, found {}", num_edges, profits.len());
        for (e, row) in profits.iter().enumerate() {
            ensure!(row.len() == num_districts, "profit row {} has {} values, expected {}", e, row.len(), num_districts);
        }

        let total = graph.total_edge_weight();
        let average = 2.0 * total / num_districts as f64;
        let minimum_demand = ((1.0 - balance) * average).max(0.0);
        let maximum_demand = ((1.0 + balance) * average).min(capacity);

        let edge_weights = (0..num_edges).map(|e| graph.edge_weight(e)).collect();
        let edge_neighbors = (0..num_edges).map(|e| graph.adjacent_edges(e)).collect();

        Ok(Instance {
            name: String::from("unnamed"),
            graph,
            num_districts,
            capacity,
            balance,
            profits,
            minimum_demand,
            maximum_demand,
            edge_weights,
            edge_neighbors,
        })
    }

    /// Parse an instance stream: `m`, `D`, `B`, a graph stream, then `|E|`
    /// rows of `m` profits.
    pub fn parse(input: &str) -> Result<Self> {
        let mut reader = TokenReader::new(input);
        let num_districts: usize = reader.parse("district count")?;
        let capacity: f64 = reader.parse("capacity")?;
        let balance: f64 = reader.parse("balance fraction")?;
        let graph = Graph::read_tokens(&mut reader)?;

        let mut profits = Vec::with_capacity(graph.num_edges());
        for _ in 0..graph.num_edges() {
            let mut row = Vec::with_capacity(num_districts);
            for _ in 0..num_districts {
                row.push(reader.parse::<f64>("profit")?);
            }
            profits.push(row);
        }
        if !reader.is_exhausted() {
            bail!("trailing data after the profit matrix");
        }

        Self::new(graph, num_districts, capacity, balance, profits)
    }

    /// Read an instance from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = read_file(path)?;
        let mut instance = Self::parse(&contents)
            .with_context(|| format!("malformed instance file {}", path.display()))?;
        if let Some(stem) = path.file_stem() {
            instance.name = stem.to_string_lossy().to_string();
        }
        Ok(instance)
    }

    /// Serialize to the instance stream format
    pub fn to_stream(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.num_districts);
        let _ = writeln!(out, "{}", self.capacity);
        let _ = writeln!(out, "{}", self.balance);
        out.push_str(&self.graph.to_stream());
        for row in &self.profits {
            let line: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path, &self.to_stream())
    }

    #[inline] pub fn graph(&self) -> &Graph { &self.graph }

    #[inline] pub fn num_districts(&self) -> usize { self.num_districts }

    #[inline] pub fn num_edges(&self) -> usize { self.edge_weights.len() }

    #[inline] pub fn capacity(&self) -> f64 { self.capacity }

    #[inline] pub fn balance(&self) -> f64 { self.balance }

    #[inline] pub fn minimum_demand(&self) -> f64 { self.minimum_demand }

    #[inline] pub fn maximum_demand(&self) -> f64 { self.maximum_demand }

    /// Profit of serving edge `e` from district `j`
    #[inline]
    pub fn profit(&self, e: EdgeId, j: usize) -> f64 {
        self.profits[e][j]
    }

    #[inline]
    pub fn edge_weight(&self, e: EdgeId) -> f64 {
        self.edge_weights[e]
    }

    /// Demand an edge adds to its district (both endpoints consume it).
    #[inline]
    pub fn edge_demand(&self, e: EdgeId) -> f64 {
        2.0 * self.edge_weights[e]
    }

    /// Edges sharing an endpoint with `e`, sorted by id.
    #[inline]
    pub fn adjacent_edges(&self, e: EdgeId) -> &[EdgeId] {
        &self.edge_neighbors[e]
    }

    /// Whether a district demand respects the upper bound.
    #[inline]
    pub fn fits_maximum(&self, demand: f64) -> bool {
        demand <= self.maximum_demand + DEMAND_TOLERANCE
    }

    /// Whether a district demand respects the lower bound.
    #[inline]
    pub fn meets_minimum(&self, demand: f64) -> bool {
        demand >= self.minimum_demand - DEMAND_TOLERANCE
    }

    /// Line graph of the instance plus an artificial hub vertex (id `|E|`)
    /// adjacent to every line-graph vertex. Consumed by the exact
    /// formulations; only its size is reported here.
    pub fn line_graph_with_hub(&self) -> Graph {
        let mut line = self.graph.line_graph();
        let hub = self.num_edges();
        line.add_vertex(Vertex::new(hub, 0.0, 0.0, 0.0));
        for e in 0..self.num_edges() {
            line.add_edge(hub, e, 0.0);
        }
        line
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let degrees: Vec<usize> = self.graph.vertex_ids().map(|v| self.graph.degree(v)).collect();
        let weights = &self.edge_weights;
        InstanceStatistics {
            name: self.name.clone(),
            num_vertices: self.graph.num_vertices(),
            num_edges: self.num_edges(),
            num_districts: self.num_districts,
            capacity: self.capacity,
            balance: self.balance,
            total_edge_weight: self.graph.total_edge_weight(),
            min_edge_weight: weights.iter().cloned().fold(f64::INFINITY, f64::min),
            max_edge_weight: weights.iter().cloned().fold(0.0, f64::max),
            min_degree: degrees.iter().copied().min().unwrap_or(0),
            max_degree: degrees.iter().copied().max().unwrap_or(0),
            minimum_demand: self.minimum_demand,
            maximum_demand: self.maximum_demand,
            connected: self.graph.is_connected(),
        }
    }
}

/// Statistics about an edge-districting instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_vertices: usize,
    pub num_edges: usize,
    pub num_districts: usize,
    pub capacity: f64,
    pub balance: f64,
    pub total_edge_weight: f64,
    pub min_edge_weight: f64,
    pub max_edge_weight: f64,
    pub min_degree: usize,
    pub max_degree: usize,
    pub minimum_demand: f64,
    pub maximum_demand: f64,
    pub connected: bool,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Vertices: {}  Edges: {}", self.num_vertices, self.num_edges)?;
        writeln!(f, "  Districts: {}", self.num_districts)?;
        writeln!(f, "  Capacity: {}  Balance: {}", self.capacity, self.balance)?;
        writeln!(f, "  Total edge weight: {:.2}", self.total_edge_weight)?;
        writeln!(f, "  Edge weight range: [{:.2}, {:.2}]", self.min_edge_weight, self.max_edge_weight)?;
        writeln!(f, "  Degree range: [{}, {}]", self.min_degree, self.max_degree)?;
        writeln!(f, "  Demand window: [{:.2}, {:.2}]", self.minimum_demand, self.maximum_demand)?;
        writeln!(f, "  Connected: {}", self.connected)
    }
}
