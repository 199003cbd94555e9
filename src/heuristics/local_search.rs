//! Local search for edge districting.
//!
//! Two neighbourhoods, applied in order while time remains:
//!
//! - district relabeling: a maximum-weight assignment between current
//!   districts and labels, since profits depend on the label;
//! - frontier relocation: move a safe frontier edge to an adjacent district
//!   that values it more, first improvement, with randomized scan order.
//!
//! Relabeling is run once more after relocation. Both moves keep a feasible
//! solution feasible and never decrease its value.

use super::assignment::max_weight_assignment;
use super::fixer::{DistrictFrontiers, UnsafeEdges};
use super::{ImprovementHeuristic, SearchContext};
use crate::graph::EdgeId;
use crate::solution::Solution;
use rand::prelude::*;

const EPS: f64 = 1e-9;

/// Relabel districts with the most profitable label permutation.
pub fn relabel_districts<'a>(mut solution: Solution<'a>) -> Solution<'a> {
    let instance = solution.instance();
    let m = solution.num_districts();

    let weights: Vec<Vec<f64>> = (0..m)
        .map(|i| {
            (0..m)
                .map(|label| solution.district(i).iter().map(|&e| instance.profit(e, label)).sum())
                .collect()
        })
        .collect();
    let labels = max_weight_assignment(&weights);

    let current: f64 = (0..m).map(|i| weights[i][i]).sum();
    let relabeled: f64 = labels.iter().enumerate().map(|(i, &l)| weights[i][l]).sum();
    if relabeled <= current + EPS {
        return solution;
    }

    log::trace!("relabel districts: {:?} ({:.2} -> {:.2})", labels, current, relabeled);
    let assignment: Vec<(EdgeId, usize)> = solution.allocated_edges().iter()
        .filter_map(|&e| solution.edge_district(e).map(|i| (e, labels[i])))
        .collect();
    for (e, label) in assignment {
        solution.set_edge_district(e, label);
    }
    solution
}

/// Relocate frontier edges to adjacent districts while it improves the value.
pub fn relocate_frontier_edges<'a>(mut solution: Solution<'a>, ctx: &mut SearchContext) -> Solution<'a> {
    let instance = solution.instance();
    let m = solution.num_districts();
    let mut unsafe_edges = UnsafeEdges::new(m);
    let mut frontiers = DistrictFrontiers::new(&solution);
    let mut moves = 0usize;

    'search: loop {
        if ctx.is_expired() {
            log::warn!("time budget expired during frontier relocation");
            break;
        }

        let mut order: Vec<usize> = (0..m).collect();
        order.shuffle(ctx.rng());
        for j in order {
            let mut eligible: Vec<EdgeId> = frontiers.inner(j).iter().copied()
                .filter(|&e| !unsafe_edges.contains(&solution, e, j))
                .collect();
            eligible.shuffle(ctx.rng());

            for e in eligible {
                let demand = instance.edge_demand(e);
                if !instance.meets_minimum(solution.district_demand(j) - demand) {
                    continue;
                }
                let mut neighbours: Vec<EdgeId> = instance.adjacent_edges(e).iter().copied()
                    .filter(|&f| solution.edge_district(f).is_some_and(|k| k != j))
                    .collect();
                neighbours.shuffle(ctx.rng());

                for f in neighbours {
                    let Some(k) = solution.edge_district(f) else {
                        continue;
                    };
                    if instance.fits_maximum(solution.district_demand(k) + demand)
                        && instance.profit(e, j) + EPS < instance.profit(e, k)
                    {
                        log::trace!("relocate edge {} from district {} to {}", e, j, k);
                        solution.set_edge_district(e, k);
                        unsafe_edges.invalidate(j);
                        unsafe_edges.invalidate(k);
                        frontiers.update(&solution, e);
                        moves += 1;
                        continue 'search;
                    }
                }
            }
        }
        break;
    }

    log::debug!("frontier relocation made {} moves", moves);
    solution
}

/// Relabeling, frontier relocation, relabeling
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSearch;

impl LocalSearch {
    pub fn new() -> Self {
        LocalSearch
    }
}

impl ImprovementHeuristic for LocalSearch {
    fn improve<'a>(&self, solution: Solution<'a>, ctx: &mut SearchContext) -> Solution<'a> {
        if ctx.is_expired() {
            return solution;
        }
        let solution = relabel_districts(solution);
        let solution = relocate_frontier_edges(solution, ctx);
        if ctx.is_expired() {
            return solution;
        }
        relabel_districts(solution)
    }

    fn name(&self) -> &str {
        "Local Search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    /// Path 0-1-2-3-4 with unit edges, m = 2, window [0, 8]
    fn path_instance(profits: &str) -> Instance {
        let stream = format!(
            "2\n100\n1\n5 4\n0 0\n1 0\n2 0\n3 0\n4 0\n0 1 1\n1 2 1\n2 3 1\n3 4 1\n{}",
            profits
        );
        Instance::parse(&stream).unwrap()
    }

    #[test]
    fn test_relabel_swaps_labels() {
        let instance = path_instance("1 1\n1 5\n1 1\n1 1\n");
        let solution = Solution::from_assignment(&instance, &[Some(0), Some(0), Some(1), Some(1)]).unwrap();
        let relabeled = relabel_districts(solution);
        assert_eq!(relabeled.edge_district(0), Some(1));
        assert_eq!(relabeled.edge_district(2), Some(0));
        assert!((relabeled.value() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_relabel_keeps_labels_on_ties() {
        let instance = path_instance("5 1\n1 5\n1 1\n1 1\n");
        let solution = Solution::from_assignment(&instance, &[Some(0), Some(0), Some(1), Some(1)]).unwrap();
        let relabeled = relabel_districts(solution.clone());
        assert_eq!(relabeled, solution);
    }

    #[test]
    fn test_relocation_moves_edge_to_better_district() {
        let instance = path_instance("5 1\n1 5\n1 1\n1 1\n");
        let solution = Solution::from_assignment(&instance, &[Some(0), Some(0), Some(1), Some(1)]).unwrap();
        let mut ctx = SearchContext::new(3, 60.0);
        let improved = LocalSearch::new().improve(solution, &mut ctx);
        assert_eq!(improved.edge_district(1), Some(1));
        assert!((improved.value() - 12.0).abs() < 1e-9);
        assert!(improved.is_feasible());
    }

    /// Petersen graph, m = 3, D = 56, B = 0.2, profits 4 + (e + 2j) mod 5
    fn petersen_instance() -> Instance {
        const EDGES: [(usize, usize, f64); 15] = [
            (0, 1, 5.0), (1, 2, 5.0), (2, 3, 5.0), (3, 4, 5.0), (0, 4, 5.0),
            (0, 5, 4.0), (1, 6, 4.0), (2, 7, 4.0), (3, 8, 4.0), (4, 9, 4.0),
            (5, 7, 5.0), (7, 9, 5.0), (6, 9, 5.0), (6, 8, 5.0), (5, 8, 5.0),
        ];
        let mut stream = String::from("3\n56\n0.2\n10 15\n");
        for v in 0..10 {
            stream.push_str(&format!("{} {}\n", v % 5, v / 5));
        }
        for (u, v, w) in EDGES {
            stream.push_str(&format!("{} {} {}\n", u, v, w));
        }
        for e in 0..15 {
            let row: Vec<String> = (0..3).map(|j| (4 + (e + 2 * j) % 5).to_string()).collect();
            stream.push_str(&row.join(" "));
            stream.push('\n');
        }
        Instance::parse(&stream).unwrap()
    }

    #[test]
    fn test_local_search_never_decreases_value() {
        let instance = petersen_instance();
        // Least profitable feasible partition of the fixture (value 67)
        let labels = [0, 0, 2, 1, 1, 0, 2, 2, 1, 1, 0, 2, 2, 1, 1];
        let assignment: Vec<Option<usize>> = labels.iter().map(|&j| Some(j)).collect();
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        assert!(solution.is_feasible());
        assert!((solution.value() - 67.0).abs() < 1e-9);

        for seed in 0..5 {
            let mut ctx = SearchContext::new(seed, 60.0);
            let improved = LocalSearch::new().improve(solution.clone(), &mut ctx);
            assert!(improved.value() >= solution.value());
            assert!(improved.is_feasible());
        }
    }
}
