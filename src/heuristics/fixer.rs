//! Repair pipeline turning an infeasible solution into a feasible one when
//! it can.
//!
//! Stages, in pipeline order:
//!
//! 1. disconnection: keep the most profitable component of each district;
//! 2. over-capacity: relocate or drop edges of districts above the maximum;
//! 3. disconnection again, since the over-capacity fallback may cut districts;
//! 4. under-balance: grow districts below the minimum by absorbing
//!    unallocated edges or stealing safe edges from neighbours;
//! 5. unallocated: hand every remaining edge to the most profitable district.
//!
//! An edge is *unsafe* in its district when it is a non-leaf bridge of the
//! district's induced subgraph: removing it would disconnect the district.
//! Unsafe sets are cached per district and recomputed only for districts a
//! stage modifies. Frontier sets are updated around each moved edge. Every
//! stage stops early when it finds no move or the deadline passes, and leaves
//! the remaining violations to the caller.

use super::{ImprovementHeuristic, SearchContext};
use crate::graph::EdgeId;
use crate::instance::Instance;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use std::collections::BTreeSet;

/// Non-leaf bridges of each district's induced subgraph, computed on demand
/// and dropped whenever the district changes.
pub(crate) struct UnsafeEdges {
    sets: Vec<Option<BTreeSet<EdgeId>>>,
}

impl UnsafeEdges {
    pub(crate) fn new(num_districts: usize) -> Self {
        UnsafeEdges { sets: vec![None; num_districts] }
    }

    /// Whether removing `e` from district `j` would disconnect it
    pub(crate) fn contains(&mut self, solution: &Solution<'_>, e: EdgeId, j: usize) -> bool {
        self.sets[j]
            .get_or_insert_with(|| {
                solution.instance().graph()
                    .induced_subgraph_from_edges(solution.district(j).iter().copied())
                    .non_leaf_bridges()
            })
            .contains(&e)
    }

    #[inline]
    pub(crate) fn invalidate(&mut self, j: usize) {
        self.sets[j] = None;
    }
}

/// Frontier sets of each district, updated edge by edge.
///
/// `outer[j]` holds the edges outside district `j` (allocated elsewhere or
/// unallocated) that share an endpoint with one of its edges. `inner[j]`
/// holds the edges of `j` sharing an endpoint with an edge of another
/// district.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DistrictFrontiers {
    outer: Vec<BTreeSet<EdgeId>>,
    inner: Vec<BTreeSet<EdgeId>>,
}

impl DistrictFrontiers {
    pub(crate) fn new(solution: &Solution<'_>) -> Self {
        let m = solution.num_districts();
        let mut frontiers = DistrictFrontiers {
            outer: vec![BTreeSet::new(); m],
            inner: vec![BTreeSet::new(); m],
        };
        for e in 0..solution.instance().num_edges() {
            frontiers.refresh(solution, e);
        }
        frontiers
    }

    #[inline]
    pub(crate) fn outer(&self, j: usize) -> &BTreeSet<EdgeId> {
        &self.outer[j]
    }

    #[inline]
    pub(crate) fn inner(&self, j: usize) -> &BTreeSet<EdgeId> {
        &self.inner[j]
    }

    /// Follow a change of district of `e`: only `e` and its adjacent edges
    /// can change membership.
    pub(crate) fn update(&mut self, solution: &Solution<'_>, e: EdgeId) {
        self.refresh(solution, e);
        for &f in solution.instance().adjacent_edges(e) {
            self.refresh(solution, f);
        }
    }

    fn refresh(&mut self, solution: &Solution<'_>, g: EdgeId) {
        for set in self.outer.iter_mut().chain(self.inner.iter_mut()) {
            set.remove(&g);
        }
        let own = solution.edge_district(g);
        for &h in solution.instance().adjacent_edges(g) {
            let Some(k) = solution.edge_district(h) else {
                continue;
            };
            if own != Some(k) {
                self.outer[k].insert(g);
                if let Some(j) = own {
                    self.inner[j].insert(g);
                }
            }
        }
    }
}

/// Shared bookkeeping for the repair stages
struct Repair<'a> {
    instance: &'a Instance,
    solution: Solution<'a>,
    unsafe_edges: UnsafeEdges,
    frontiers: DistrictFrontiers,
}

impl<'a> Repair<'a> {
    fn new(solution: Solution<'a>) -> Self {
        let m = solution.num_districts();
        Repair {
            instance: solution.instance(),
            frontiers: DistrictFrontiers::new(&solution),
            solution,
            unsafe_edges: UnsafeEdges::new(m),
        }
    }

    fn into_solution(self) -> Solution<'a> {
        self.solution
    }

    fn is_unsafe(&mut self, e: EdgeId, j: usize) -> bool {
        self.unsafe_edges.contains(&self.solution, e, j)
    }

    /// Move `e` to `target` (or unassign it) and invalidate touched districts.
    fn reassign(&mut self, e: EdgeId, target: Option<usize>) {
        if let Some(j) = self.solution.edge_district(e) {
            self.unsafe_edges.invalidate(j);
        }
        match target {
            Some(k) => {
                self.solution.set_edge_district(e, k);
                self.unsafe_edges.invalidate(k);
            }
            None => {
                self.solution.unset_edge_district(e);
            }
        }
        self.frontiers.update(&self.solution, e);
    }

    /// Districts owning an edge adjacent to `e`, other than `exclude`
    fn neighbouring_districts(&self, e: EdgeId, exclude: Option<usize>) -> BTreeSet<usize> {
        self.instance.adjacent_edges(e).iter()
            .filter_map(|&f| self.solution.edge_district(f))
            .filter(|&k| Some(k) != exclude)
            .collect()
    }

    fn disconnection(&mut self, ctx: &SearchContext) {
        let mut removed = 0usize;
        for j in 0..self.solution.num_districts() {
            if ctx.is_expired() {
                log::warn!("time budget expired during disconnection repair");
                break;
            }
            let induced = self.instance.graph()
                .induced_subgraph_from_edges(self.solution.district(j).iter().copied());
            if induced.is_connected() {
                continue;
            }

            let components: Vec<Vec<EdgeId>> = induced.connected_components().iter()
                .map(|c| c.edge_ids().collect())
                .collect();
            let keep = components.iter()
                .enumerate()
                .max_by_key(|(_, edges)| {
                    let profit: f64 = edges.iter().map(|&e| self.instance.profit(e, j)).sum();
                    (OrderedFloat(profit), edges.len())
                })
                .map(|(idx, _)| idx);

            for (idx, edges) in components.iter().enumerate() {
                if Some(idx) == keep {
                    continue;
                }
                for &e in edges {
                    log::trace!("disconnection: unassign edge {} from district {}", e, j);
                    self.reassign(e, None);
                    removed += 1;
                }
            }
        }
        log::debug!("disconnection repair unassigned {} edges", removed);
    }

    fn over_capacity(&mut self, ctx: &SearchContext) {
        let (mut relocated, mut dropped) = (0usize, 0usize);
        loop {
            if ctx.is_expired() {
                log::warn!("time budget expired during over-capacity repair");
                break;
            }
            let Some(j) = (0..self.solution.num_districts())
                .find(|&j| !self.instance.fits_maximum(self.solution.district_demand(j)))
            else {
                break;
            };

            let edges: Vec<EdgeId> = self.solution.district(j).iter().copied().collect();
            let mut best: Option<((OrderedFloat<f64>, OrderedFloat<f64>, OrderedFloat<f64>), EdgeId, usize)> = None;
            for &e in &edges {
                if self.is_unsafe(e, j) {
                    continue;
                }
                let demand = self.instance.edge_demand(e);
                if !self.instance.meets_minimum(self.solution.district_demand(j) - demand) {
                    continue;
                }
                for k in self.neighbouring_districts(e, Some(j)) {
                    if !self.instance.fits_maximum(self.solution.district_demand(k) + demand) {
                        continue;
                    }
                    let key = (
                        OrderedFloat(-self.instance.profit(e, j)),
                        OrderedFloat(self.instance.edge_weight(e)),
                        OrderedFloat(self.instance.profit(e, k)),
                    );
                    if best.as_ref().map_or(true, |(b, _, _)| key > *b) {
                        best = Some((key, e, k));
                    }
                }
            }

            if let Some((_, e, k)) = best {
                log::trace!("over-capacity: relocate edge {} from district {} to {}", e, j, k);
                self.reassign(e, Some(k));
                relocated += 1;
                continue;
            }

            // No safe relocation: drop the worst edge, connectivity is restored later
            let worst = edges.iter().copied().max_by_key(|&e| {
                (OrderedFloat(-self.instance.profit(e, j)), OrderedFloat(self.instance.edge_weight(e)))
            });
            let Some(e) = worst else {
                break;
            };
            log::trace!("over-capacity: unassign edge {} from district {}", e, j);
            self.reassign(e, None);
            dropped += 1;
        }
        log::debug!("over-capacity repair relocated {} edges and unassigned {}", relocated, dropped);
    }

    /// Best move into district `j`: absorb an unallocated edge, else steal a
    /// safe edge from a donor that stays above the minimum.
    fn balance_move(&mut self, j: usize) -> Option<EdgeId> {
        let Repair { instance, solution, unsafe_edges, frontiers } = self;
        let instance = *instance;
        let demand_j = solution.district_demand(j);
        let every_edge: BTreeSet<EdgeId>;
        let pool = if solution.district(j).is_empty() {
            every_edge = (0..instance.num_edges()).collect();
            &every_edge
        } else {
            frontiers.outer(j)
        };

        let absorb = pool.iter().copied()
            .filter(|&e| solution.edge_district(e).is_none())
            .filter(|&e| instance.fits_maximum(demand_j + instance.edge_demand(e)))
            .max_by_key(|&e| (OrderedFloat(instance.profit(e, j)), OrderedFloat(instance.edge_weight(e))));
        if absorb.is_some() {
            return absorb;
        }

        let mut best: Option<((OrderedFloat<f64>, OrderedFloat<f64>), EdgeId)> = None;
        for &e in pool {
            let Some(k) = solution.edge_district(e) else {
                continue;
            };
            let demand = instance.edge_demand(e);
            if demand <= 0.0
                || !instance.fits_maximum(demand_j + demand)
                || !instance.meets_minimum(solution.district_demand(k) - demand)
                || unsafe_edges.contains(solution, e, k)
            {
                continue;
            }
            let key = (
                OrderedFloat(instance.profit(e, j) - instance.profit(e, k)),
                OrderedFloat(instance.edge_weight(e)),
            );
            if best.as_ref().map_or(true, |(b, _)| key > *b) {
                best = Some((key, e));
            }
        }
        best.map(|(_, e)| e)
    }

    fn under_balance(&mut self, ctx: &SearchContext) {
        let mut moves = 0usize;
        'outer: loop {
            if ctx.is_expired() {
                log::warn!("time budget expired during under-balance repair");
                break;
            }
            let targets: Vec<usize> = (0..self.solution.num_districts())
                .filter(|&j| !self.instance.meets_minimum(self.solution.district_demand(j)))
                .collect();
            for j in targets {
                if let Some(e) = self.balance_move(j) {
                    log::trace!("under-balance: move edge {} into district {}", e, j);
                    self.reassign(e, Some(j));
                    moves += 1;
                    continue 'outer;
                }
            }
            break;
        }
        log::debug!("under-balance repair made {} moves", moves);
    }

    fn unallocated(&mut self, ctx: &SearchContext) {
        let mut assigned = 0usize;
        while !self.solution.unallocated_edges().is_empty() {
            if ctx.is_expired() {
                log::warn!("time budget expired during unallocated-edge repair");
                break;
            }

            let key = |e: EdgeId, j: usize| {
                let weight = self.instance.edge_weight(e);
                (
                    OrderedFloat(self.instance.profit(e, j)),
                    OrderedFloat(-weight),
                    OrderedFloat(-(self.solution.district_demand(j) + 2.0 * weight)),
                )
            };
            let unallocated = self.solution.unallocated_edges();
            let adjacent = unallocated.iter()
                .flat_map(|&e| self.neighbouring_districts(e, None).into_iter().map(move |j| (e, j)))
                .max_by_key(|&(e, j)| key(e, j));
            let choice = adjacent.or_else(|| {
                unallocated.iter()
                    .flat_map(|&e| (0..self.solution.num_districts()).map(move |j| (e, j)))
                    .max_by_key(|&(e, j)| key(e, j))
            });

            let Some((e, j)) = choice else {
                break;
            };
            log::trace!("unallocated: assign edge {} to district {}", e, j);
            self.reassign(e, Some(j));
            assigned += 1;
        }
        log::debug!("unallocated-edge repair assigned {} edges", assigned);
    }
}

/// Keep only the most profitable connected component of each district.
pub fn repair_disconnection<'a>(solution: Solution<'a>, ctx: &SearchContext) -> Solution<'a> {
    let mut repair = Repair::new(solution);
    repair.disconnection(ctx);
    repair.into_solution()
}

/// Bring every district back under the maximum demand.
pub fn repair_over_capacity<'a>(solution: Solution<'a>, ctx: &SearchContext) -> Solution<'a> {
    let mut repair = Repair::new(solution);
    repair.over_capacity(ctx);
    repair.into_solution()
}

/// Grow districts below the minimum demand.
pub fn repair_under_balance<'a>(solution: Solution<'a>, ctx: &SearchContext) -> Solution<'a> {
    let mut repair = Repair::new(solution);
    repair.under_balance(ctx);
    repair.into_solution()
}

/// Assign every unallocated edge.
pub fn repair_unallocated<'a>(solution: Solution<'a>, ctx: &SearchContext) -> Solution<'a> {
    let mut repair = Repair::new(solution);
    repair.unallocated(ctx);
    repair.into_solution()
}

/// Full repair pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct SolutionFixer;

impl SolutionFixer {
    pub fn new() -> Self {
        SolutionFixer
    }

    pub fn fix<'a>(&self, solution: Solution<'a>, ctx: &SearchContext) -> Solution<'a> {
        let mut repair = Repair::new(solution);
        repair.disconnection(ctx);
        repair.over_capacity(ctx);
        repair.disconnection(ctx);
        repair.under_balance(ctx);
        repair.unallocated(ctx);
        repair.into_solution()
    }
}

impl ImprovementHeuristic for SolutionFixer {
    fn improve<'a>(&self, solution: Solution<'a>, ctx: &mut SearchContext) -> Solution<'a> {
        self.fix(solution, ctx)
    }

    fn name(&self) -> &str {
        "Solution Fixer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3x3 grid, unit weights, m = 3, D = 8, B = 0
    const GRID_INSTANCE: &str = "3\n8\n0\n9 12\n\
        0 0\n1 0\n2 0\n0 1\n1 1\n2 1\n0 2\n1 2\n2 2\n\
        0 1 1\n1 2 1\n3 4 1\n4 5 1\n6 7 1\n7 8 1\n\
        0 3 1\n3 6 1\n1 4 1\n4 7 1\n2 5 1\n5 8 1\n\
        1 2 3\n2 3 1\n3 1 2\n1 1 1\n2 2 2\n3 3 3\n\
        1 2 3\n2 3 1\n3 1 2\n1 1 1\n2 2 2\n3 3 3\n";

    /// Path 0-1-2-3-4 with unit edges and unit profits
    fn path_instance(capacity: f64, balance: f64) -> Instance {
        let stream = format!(
            "2\n{}\n{}\n5 4\n0 0\n1 0\n2 0\n3 0\n4 0\n0 1 1\n1 2 1\n2 3 1\n3 4 1\n1 1\n1 1\n1 1\n1 1\n",
            capacity, balance
        );
        Instance::parse(&stream).unwrap()
    }

    fn ctx() -> SearchContext {
        SearchContext::new(0, 60.0)
    }

    #[test]
    fn test_stages_leave_feasible_solution_unchanged() {
        let instance = Instance::parse(GRID_INSTANCE).unwrap();
        let assignment = vec![
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
            Some(0), Some(0), Some(1), Some(1), Some(2), Some(2),
        ];
        let feasible = Solution::from_assignment(&instance, &assignment).unwrap();
        assert!(feasible.is_feasible());

        let ctx = ctx();
        assert_eq!(repair_disconnection(feasible.clone(), &ctx), feasible);
        assert_eq!(repair_over_capacity(feasible.clone(), &ctx), feasible);
        assert_eq!(repair_under_balance(feasible.clone(), &ctx), feasible);
        assert_eq!(repair_unallocated(feasible.clone(), &ctx), feasible);
        assert_eq!(SolutionFixer::new().fix(feasible.clone(), &ctx), feasible);
    }

    #[test]
    fn test_disconnection_keeps_most_profitable_component() {
        let instance = Instance::parse(GRID_INSTANCE).unwrap();
        // Edges 0 and 1 (profit 1 + 2) against edge 4 (profit 2)
        let mut assignment = vec![None; 12];
        for e in [0, 1, 4] {
            assignment[e] = Some(0);
        }
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let repaired = repair_disconnection(solution, &ctx());
        assert_eq!(repaired.district(0).iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(repaired.edge_district(4), None);
        assert!(repaired.is_connected());
    }

    #[test]
    fn test_over_capacity_relocates_safe_edge() {
        // W = 4, m = 2, B = 1: window [0, 4]
        let instance = path_instance(4.0, 1.0);
        let assignment = vec![Some(0), Some(0), Some(0), Some(1)];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let repaired = repair_over_capacity(solution, &ctx());
        // Edge 1 is a non-leaf bridge and edge 0 has no other district nearby
        assert_eq!(repaired.edge_district(2), Some(1));
        assert!(repaired.is_feasible());
    }

    #[test]
    fn test_over_capacity_falls_back_to_dropping() {
        let instance = path_instance(4.0, 1.0);
        let assignment = vec![Some(0); 4];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let repaired = repair_over_capacity(solution, &ctx());
        assert!(repaired.respects_capacity());
        assert_eq!(repaired.unallocated_edges().len(), 2);
    }

    #[test]
    fn test_under_balance_steals_leaf_edge() {
        // W = 4, m = 2, B = 0: window [4, 4]
        let instance = path_instance(100.0, 0.0);
        let assignment = vec![Some(0), Some(1), Some(1), Some(1)];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let repaired = repair_under_balance(solution, &ctx());
        assert_eq!(repaired.edge_district(1), Some(0));
        assert!(repaired.is_feasible());
    }

    #[test]
    fn test_unallocated_prefers_adjacent_districts() {
        let instance = path_instance(100.0, 1.0);
        let assignment = vec![Some(0), None, None, None];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let repaired = repair_unallocated(solution, &ctx());
        assert!(repaired.is_partition());
        assert!(repaired.district(1).is_empty());
        assert!(repaired.is_connected());
    }

    #[test]
    fn test_frontiers_follow_moves() {
        let instance = Instance::parse(GRID_INSTANCE).unwrap();
        let mut assignment = vec![None; 12];
        assignment[0] = Some(0);
        assignment[5] = Some(1);
        let mut solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let mut frontiers = DistrictFrontiers::new(&solution);
        assert_eq!(frontiers.outer(0).iter().copied().collect::<Vec<_>>(), vec![1, 6, 8]);
        assert!(frontiers.inner(0).is_empty());

        let moves = [
            (1, Some(0)), (2, Some(1)), (8, Some(1)), (0, None), (9, Some(2)),
            (1, Some(1)), (6, Some(0)), (7, Some(0)), (3, Some(2)), (8, None),
        ];
        for (e, target) in moves {
            match target {
                Some(j) => solution.set_edge_district(e, j),
                None => solution.unset_edge_district(e),
            };
            frontiers.update(&solution, e);
            assert_eq!(frontiers, DistrictFrontiers::new(&solution));
        }
        for j in 0..3 {
            for &e in frontiers.inner(j) {
                assert_eq!(solution.edge_district(e), Some(j));
            }
            for &e in frontiers.outer(j) {
                assert_ne!(solution.edge_district(e), Some(j));
            }
        }
    }

    #[test]
    fn test_repair_keeps_frontiers_current() {
        let instance = Instance::parse(GRID_INSTANCE).unwrap();
        let assignment = vec![
            Some(0), Some(0), Some(0), Some(0), None, None,
            Some(0), None, Some(1), None, Some(2), None,
        ];
        let solution = Solution::from_assignment(&instance, &assignment).unwrap();
        let ctx = ctx();
        let mut repair = Repair::new(solution);
        repair.disconnection(&ctx);
        repair.over_capacity(&ctx);
        repair.under_balance(&ctx);
        repair.unallocated(&ctx);
        assert_eq!(repair.frontiers, DistrictFrontiers::new(&repair.solution));
        assert!(repair.solution.is_partition());
    }

    #[test]
    fn test_pipeline_restores_partition() {
        let instance = Instance::parse(GRID_INSTANCE).unwrap();
        let solution = Solution::from_assignment(&instance, &vec![Some(0); 12]).unwrap();
        let repaired = SolutionFixer::new().fix(solution, &ctx());
        assert!(repaired.is_partition());
    }
}
