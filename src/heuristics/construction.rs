//! Semi-greedy randomized construction.
//!
//! Districts are grown edge by edge. At each step a candidate list of
//! (edge, district) pairs is built with a four-tier fallback:
//!
//! 1. frontier edges of nonempty districts still below the minimum demand,
//!    within the maximum demand;
//! 2. any district's frontier (or any unallocated edge for an empty
//!    district), within the maximum demand;
//! 3. the same without the capacity cap;
//! 4. every unallocated edge with every district.
//!
//! Candidates whose profit is at least `maxC - alpha * (maxC - minC)` form
//! the restricted candidate list, and one of them is drawn uniformly.

use super::{ConstructionHeuristic, SearchContext};
use crate::graph::EdgeId;
use crate::instance::Instance;
use crate::solution::Solution;
use rand::prelude::*;
use std::collections::BTreeSet;

const EPS: f64 = 1e-9;

/// Semi-greedy construction parameterized by the greediness threshold `alpha`
/// (0 is pure greedy, 1 is uniform random among candidates).
#[derive(Debug, Clone, Copy)]
pub struct SemiGreedyConstruction {
    pub alpha: f64,
}

impl SemiGreedyConstruction {
    pub fn new(alpha: f64) -> Self {
        SemiGreedyConstruction { alpha: alpha.clamp(0.0, 1.0) }
    }
}

impl Default for SemiGreedyConstruction {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Unallocated edges adjacent to each district, kept in step with the solution
struct Frontiers {
    sets: Vec<BTreeSet<EdgeId>>,
}

impl Frontiers {
    fn new(num_districts: usize) -> Self {
        Frontiers { sets: vec![BTreeSet::new(); num_districts] }
    }

    fn assign(&mut self, instance: &Instance, solution: &Solution<'_>, e: EdgeId, j: usize) {
        for set in &mut self.sets {
            set.remove(&e);
        }
        for &f in instance.adjacent_edges(e) {
            if solution.edge_district(f).is_none() {
                self.sets[j].insert(f);
            }
        }
    }
}

fn candidates(
    instance: &Instance,
    solution: &Solution<'_>,
    frontiers: &Frontiers,
) -> Vec<(EdgeId, usize)> {
    let m = instance.num_districts();
    let fits = |e: EdgeId, j: usize| {
        instance.fits_maximum(solution.district_demand(j) + instance.edge_demand(e))
    };

    // Tier 1: grow districts that are still short of the minimum
    let mut list: Vec<(EdgeId, usize)> = (0..m)
        .filter(|&j| !solution.district(j).is_empty())
        .filter(|&j| !instance.meets_minimum(solution.district_demand(j)))
        .flat_map(move |j| frontiers.sets[j].iter().map(move |&e| (e, j)))
        .filter(|&(e, j)| fits(e, j))
        .collect();
    if !list.is_empty() {
        return list;
    }

    // Tiers 2 and 3: any district, capped then uncapped
    for capped in [true, false] {
        for j in 0..m {
            let pool = if solution.district(j).is_empty() {
                solution.unallocated_edges()
            } else {
                &frontiers.sets[j]
            };
            list.extend(pool.iter().map(|&e| (e, j)).filter(|&(e, j)| !capped || fits(e, j)));
        }
        if !list.is_empty() {
            return list;
        }
    }

    // Tier 4: full cross product
    solution.unallocated_edges().iter()
        .flat_map(|&e| (0..m).map(move |j| (e, j)))
        .collect()
}

impl ConstructionHeuristic for SemiGreedyConstruction {
    fn construct<'a>(&self, instance: &'a Instance, ctx: &mut SearchContext) -> Solution<'a> {
        let mut solution = Solution::new(instance);
        let mut frontiers = Frontiers::new(instance.num_districts());

        while !solution.unallocated_edges().is_empty() {
            if ctx.is_expired() {
                log::warn!(
                    "time budget expired during construction ({} edges left unallocated)",
                    solution.unallocated_edges().len()
                );
                break;
            }

            let list = candidates(instance, &solution, &frontiers);
            let (min_c, max_c) = list.iter()
                .map(|&(e, j)| instance.profit(e, j))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c), hi.max(c)));
            let threshold = max_c - self.alpha * (max_c - min_c) - EPS;

            let rcl: Vec<(EdgeId, usize)> = list.into_iter()
                .filter(|&(e, j)| instance.profit(e, j) >= threshold)
                .collect();
            let &(e, j) = rcl.choose(ctx.rng())
                .expect("restricted candidate list is empty while edges remain unallocated");

            solution.set_edge_district(e, j);
            frontiers.assign(instance, &solution, e, j);
        }

        solution
    }

    fn name(&self) -> &str {
        "Semi-Greedy Construction"
    }
}
