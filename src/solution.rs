//! Solution representation for edge districting.
//!
//! A [`Solution`] is an edge → district assignment over a borrowed
//! [`Instance`], with per-district demand and value, the global objective,
//! and the allocated / unallocated edge sets maintained incrementally.
//! Only [`Solution::set_edge_district`] and [`Solution::unset_edge_district`]
//! mutate it, and both update every aggregate together.

use crate::graph::EdgeId;
use crate::instance::Instance;
use crate::io::{read_file, write_file, TokenReader};
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

/// A (possibly partial) partition of the instance's edges into districts
#[derive(Debug, Clone)]
pub struct Solution<'a> {
    instance: &'a Instance,
    districts: Vec<BTreeSet<EdgeId>>,
    edge_district: Vec<Option<usize>>,
    district_demand: Vec<f64>,
    district_value: Vec<f64>,
    value: f64,
    allocated: BTreeSet<EdgeId>,
    unallocated: BTreeSet<EdgeId>,
}

/// Which of the four feasibility conditions a solution violates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations {
    pub not_partition: bool,
    pub disconnected: bool,
    pub over_capacity: bool,
    pub unbalanced: bool,
}

impl Violations {
    pub fn is_feasible(&self) -> bool {
        !(self.not_partition || self.disconnected || self.over_capacity || self.unbalanced)
    }
}

impl<'a> Solution<'a> {
    /// Empty solution: every edge unallocated
    pub fn new(instance: &'a Instance) -> Self {
        let m = instance.num_districts();
        Solution {
            instance,
            districts: vec![BTreeSet::new(); m],
            edge_district: vec![None; instance.num_edges()],
            district_demand: vec![0.0; m],
            district_value: vec![0.0; m],
            value: 0.0,
            allocated: BTreeSet::new(),
            unallocated: (0..instance.num_edges()).collect(),
        }
    }

    /// Build a solution from an initial assignment (one entry per edge).
    pub fn from_assignment(instance: &'a Instance, assignment: &[Option<usize>]) -> Result<Self> {
        ensure!(
            assignment.len() == instance.num_edges(),
            "assignment has {} entries, expected {}", assignment.len(), instance.num_edges()
        );
        let mut solution = Solution::new(instance);
        for (e, district) in assignment.iter().enumerate() {
            if let Some(j) = *district {
                ensure!(solution.set_edge_district(e, j), "district {} of edge {} is out of range", j, e);
            }
        }
        Ok(solution)
    }

    #[inline] pub fn instance(&self) -> &'a Instance { self.instance }

    #[inline] pub fn num_districts(&self) -> usize { self.districts.len() }

    /// Edges currently in district `j`
    #[inline]
    pub fn district(&self, j: usize) -> &BTreeSet<EdgeId> {
        &self.districts[j]
    }

    pub fn districts(&self) -> &[BTreeSet<EdgeId>] {
        &self.districts
    }

    /// District of edge `e`, `None` when unallocated
    #[inline]
    pub fn edge_district(&self, e: EdgeId) -> Option<usize> {
        self.edge_district[e]
    }

    /// Assignment vector, one entry per edge.
    pub fn assignment(&self) -> &[Option<usize>] {
        &self.edge_district
    }

    #[inline] pub fn district_demand(&self, j: usize) -> f64 { self.district_demand[j] }

    #[inline] pub fn district_value(&self, j: usize) -> f64 { self.district_value[j] }

    pub fn district_demands(&self) -> &[f64] {
        &self.district_demand
    }

    /// Objective value: total profit of the allocated edges
    #[inline] pub fn value(&self) -> f64 { self.value }

    pub fn allocated_edges(&self) -> &BTreeSet<EdgeId> {
        &self.allocated
    }

    pub fn unallocated_edges(&self) -> &BTreeSet<EdgeId> {
        &self.unallocated
    }

    /// Assign edge `e` to district `j`, first removing it from its previous
    /// district. Returns `false` for an out-of-range edge or district.
    pub fn set_edge_district(&mut self, e: EdgeId, j: usize) -> bool {
        if e >= self.edge_district.len() || j >= self.districts.len() {
            return false;
        }
        match self.edge_district[e] {
            Some(current) if current == j => return true,
            Some(_) => {
                self.unset_edge_district(e);
            }
            None => {}
        }

        let demand = self.instance.edge_demand(e);
        let profit = self.instance.profit(e, j);
        self.districts[j].insert(e);
        self.edge_district[e] = Some(j);
        self.district_demand[j] += demand;
        self.district_value[j] += profit;
        self.value += profit;
        self.unallocated.remove(&e);
        self.allocated.insert(e);
        true
    }

    /// Remove edge `e` from its district. Returns `false` when it was not allocated.
    pub fn unset_edge_district(&mut self, e: EdgeId) -> bool {
        let Some(j) = self.edge_district.get(e).copied().flatten() else {
            return false;
        };

        let demand = self.instance.edge_demand(e);
        let profit = self.instance.profit(e, j);
        self.districts[j].remove(&e);
        self.edge_district[e] = None;
        self.district_demand[j] -= demand;
        self.district_value[j] -= profit;
        self.value -= profit;
        self.allocated.remove(&e);
        self.unallocated.insert(e);
        if self.districts[j].is_empty() {
            // Drop accumulated rounding drift once the district is empty
            self.district_demand[j] = 0.0;
            self.district_value[j] = 0.0;
        }
        true
    }

    /// Every edge has a district
    pub fn is_partition(&self) -> bool {
        self.unallocated.is_empty()
    }

    /// Whether the subgraph induced by district `j` is connected
    pub fn is_district_connected(&self, j: usize) -> bool {
        self.instance.graph()
            .induced_subgraph_from_edges(self.districts[j].iter().copied())
            .is_connected()
    }

    /// Every district induces a connected subgraph
    pub fn is_connected(&self) -> bool {
        (0..self.num_districts()).all(|j| self.is_district_connected(j))
    }

    /// Every district's demand is at most the maximum demand
    pub fn respects_capacity(&self) -> bool {
        self.district_demand.iter().all(|&d| self.instance.fits_maximum(d))
    }

    /// Every district's demand lies within `[minimum_demand, maximum_demand]`
    pub fn is_balanced(&self) -> bool {
        self.district_demand.iter()
            .all(|&d| self.instance.meets_minimum(d) && self.instance.fits_maximum(d))
    }

    pub fn is_feasible(&self) -> bool {
        self.is_partition() && self.respects_capacity() && self.is_balanced() && self.is_connected()
    }

    /// Evaluate the four predicates independently
    pub fn violations(&self) -> Violations {
        Violations {
            not_partition: !self.is_partition(),
            disconnected: !self.is_connected(),
            over_capacity: !self.respects_capacity(),
            unbalanced: !self.is_balanced(),
        }
    }

    /// Parse a solution stream: `m` district sizes, then per district that
    /// many `u v w` lines identifying instance edges.
    pub fn parse(instance: &'a Instance, input: &str) -> Result<Self> {
        let mut reader = TokenReader::new(input);
        let m = instance.num_districts();
        let mut sizes = Vec::with_capacity(m);
        for _ in 0..m {
            sizes.push(reader.parse::<usize>("district size")?);
        }

        let mut solution = Solution::new(instance);
        for (j, &size) in sizes.iter().enumerate() {
            for _ in 0..size {
                let u: usize = reader.parse("edge endpoint")?;
                let v: usize = reader.parse("edge endpoint")?;
                let w: f64 = reader.parse("edge weight")?;
                let e = instance.graph().edge_between(u, v)
                    .filter(|&e| (instance.edge_weight(e) - w).abs() <= 1e-6)
                    .ok_or_else(|| anyhow!("district {} lists edge {} {} {} which is not in the instance", j, u, v, w))?;
                ensure!(solution.edge_district(e).is_none(), "edge {} {} is listed twice", u, v);
                solution.set_edge_district(e, j);
            }
        }
        Ok(solution)
    }

    pub fn from_file<P: AsRef<Path>>(instance: &'a Instance, path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = read_file(path)?;
        Self::parse(instance, &contents)
            .with_context(|| format!("malformed solution file {}", path.display()))
    }

    /// Serialize to the solution stream format
    pub fn to_stream(&self) -> String {
        let mut out = String::new();
        for district in &self.districts {
            let _ = writeln!(out, "{}", district.len());
        }
        for district in &self.districts {
            for &e in district {
                if let Some(edge) = self.instance.graph().edge(e) {
                    let _ = writeln!(out, "{}", edge);
                }
            }
        }
        out
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path, &self.to_stream())
    }

    /// Serializable snapshot of the solution
    pub fn summary(&self) -> SolutionSummary {
        SolutionSummary {
            instance: self.instance.name.clone(),
            value: self.value,
            feasible: self.is_feasible(),
            violations: self.violations(),
            districts: self.districts.iter().map(|d| d.iter().copied().collect()).collect(),
            demands: self.district_demand.clone(),
            values: self.district_value.clone(),
            unallocated: self.unallocated.iter().copied().collect(),
        }
    }
}

impl PartialEq for Solution<'_> {
    /// Two solutions are equal when they assign every edge of the same
    /// instance to the same district.
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.instance, other.instance) && self.edge_district == other.edge_district
    }
}

impl std::fmt::Display for Solution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.instance.name)?;
        writeln!(f, "  Value: {:.2}", self.value)?;
        writeln!(f, "  Feasible: {}", self.is_feasible())?;
        for (j, district) in self.districts.iter().enumerate() {
            writeln!(f, "  District {}: {} edges, demand {:.2}, value {:.2}",
                j, district.len(), self.district_demand[j], self.district_value[j])?;
        }
        if !self.unallocated.is_empty() {
            writeln!(f, "  Unallocated: {:?}", self.unallocated)?;
        }
        Ok(())
    }
}

/// Serializable view of a [`Solution`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub instance: String,
    pub value: f64,
    pub feasible: bool,
    pub violations: Violations,
    pub districts: Vec<Vec<EdgeId>>,
    pub demands: Vec<f64>,
    pub values: Vec<f64>,
    pub unallocated: Vec<EdgeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    // 3x3 grid, unit weights, m = 3, D = 8, B = 0
    const GRID_INSTANCE: &str = "3\n8\n0\n9 12\n\
        0 0\n1 0\n2 0\n0 1\n1 1\n2 1\n0 2\n1 2\n2 2\n\
        0 1 1\n1 2 1\n3 4 1\n4 5 1\n6 7 1\n7 8 1\n\
        0 3 1\n3 6 1\n1 4 1\n4 7 1\n2 5 1\n5 8 1\n\
        1 2 3\n2 3 1\n3 1 2\n1 1 1\n2 2 2\n3 3 3\n\
        1 2 3\n2 3 1\n3 1 2\n1 1 1\n2 2 2\n3 3 3\n";

    fn create_test_instance() -> Instance {
        Instance::parse(GRID_INSTANCE).unwrap()
    }

    #[test]
    fn test_empty_solution() {
        let instance = create_test_instance();
        let solution = Solution::new(&instance);
        assert_eq!(solution.value(), 0.0);
        assert_eq!(solution.unallocated_edges().len(), 12);
        assert!(!solution.is_partition());
        assert!(solution.is_connected());
        assert!(solution.respects_capacity());
        assert!(!solution.is_balanced());
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_set_and_unset() {
        let instance = create_test_instance();
        let mut solution = Solution::new(&instance);

        assert!(solution.set_edge_district(0, 2));
        assert_eq!(solution.edge_district(0), Some(2));
        assert!((solution.value() - 3.0).abs() < 1e-12);
        assert!((solution.district_demand(2) - 2.0).abs() < 1e-12);

        // Reassignment moves aggregates atomically
        assert!(solution.set_edge_district(0, 1));
        assert!(solution.district(2).is_empty());
        assert_eq!(solution.district_demand(2), 0.0);
        assert!((solution.value() - 2.0).abs() < 1e-12);

        assert!(solution.unset_edge_district(0));
        assert!(!solution.unset_edge_district(0));
        assert_eq!(solution.value(), 0.0);
        assert!(!solution.set_edge_district(99, 0));
        assert!(!solution.set_edge_district(0, 3));
    }

    #[test]
    fn test_aggregate_consistency_after_random_mutations() {
        let instance = create_test_instance();
        let mut solution = Solution::new(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..500 {
            let e = rng.gen_range(0..instance.num_edges());
            if rng.gen_bool(0.3) {
                solution.unset_edge_district(e);
            } else {
                solution.set_edge_district(e, rng.gen_range(0..3));
            }

            let demand: f64 = solution.district_demands().iter().sum();
            let expected_demand: f64 = solution.allocated_edges().iter().map(|&e| instance.edge_demand(e)).sum();
            assert!((demand - expected_demand).abs() < 1e-9);

            let expected_value: f64 = solution.allocated_edges().iter()
                .map(|&e| instance.profit(e, solution.edge_district(e).unwrap()))
                .sum();
            assert!((solution.value() - expected_value).abs() < 1e-9);
            assert_eq!(solution.allocated_edges().len() + solution.unallocated_edges().len(), 12);
        }
    }

    #[test]
    fn test_feasible_grid_partition() {
        let instance = create_test_instance();
        // Row 0 + column 0, row 1 + column 1, row 2 + column 2
        let assignment = vec![
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
        ];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        assert!(solution.is_feasible());
        assert!(solution.violations().is_feasible());
    }

    #[test]
    fn test_violations_are_independent() {
        let instance = create_test_instance();
        // Two opposite corners of the grid in district 0: disconnected and under-balanced
        let mut assignment = vec![None; 12];
        assignment[0] = Some(0);
        assignment[5] = Some(0);
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let violations = solution.violations();
        assert!(violations.not_partition);
        assert!(violations.disconnected);
        assert!(!violations.over_capacity);
        assert!(violations.unbalanced);

        let over = Solution::from_assignment(&instance, &vec![Some(0); 12]).unwrap();
        let violations = over.violations();
        assert!(!violations.not_partition);
        assert!(!violations.disconnected);
        assert!(violations.over_capacity);
        assert!(violations.unbalanced);
    }

    #[test]
    fn test_stream_round_trip() {
        let instance = create_test_instance();
        let assignment = vec![
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
        ];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let parsed = Solution::parse(&instance, &solution.to_stream()).unwrap();
        assert_eq!(parsed, solution);
        assert_eq!(parsed.value(), solution.value());

        assert!(Solution::parse(&instance, "1\n0\n0\n0 8 1\n").is_err());
    }

    #[test]
    fn test_summary_serializes() {
        let instance = create_test_instance();
        let mut solution = Solution::new(&instance);
        solution.set_edge_district(3, 1);
        let json = serde_json::to_string(&solution.summary()).unwrap();
        assert!(json.contains("\"unallocated\""));
        assert!(json.contains("\"not_partition\":true"));
    }
}
