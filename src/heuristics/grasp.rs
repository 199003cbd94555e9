//! Reactive GRASP driver.
//!
//! Each iteration draws a greediness value `alpha` from a discrete set
//! according to adaptive probabilities, builds a solution with the
//! semi-greedy construction, repairs it when infeasible and improves it with
//! local search when it looks promising: after the first `reweight_period`
//! accepted solutions, only when `value >= best * (mean - 2 std)` of the
//! pre/post-improvement ratios seen so far. Every `reweight_period` accepted
//! solutions, the probability of each `alpha` is reset proportionally to
//! `mean value obtained with alpha / best value`.
//!
//! The run stops when the time budget is exhausted, when the optional
//! iteration cap is reached, or when an externally supplied dual bound is
//! within one unit of the best value.

use super::{
    ConstructionHeuristic, ImprovementHeuristic, LocalSearch, SearchContext, SemiGreedyConstruction,
    SolutionFixer, Solver,
};
use crate::instance::Instance;
use crate::solution::{Solution, Violations};
use crate::statistics::Statistics;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// Parameters of a reactive GRASP run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraspConfig {
    /// Time budget in seconds
    pub time_limit: f64,
    pub seed: u64,
    /// Number of alpha values, `{1/n, 2/n, ..., 1}`
    pub alpha_count: usize,
    /// Accepted solutions between two reweightings; also the number of first
    /// feasible solutions always sent to local search
    pub reweight_period: usize,
    pub max_iterations: Option<u64>,
    /// Known dual bound; the run stops once the gap drops below one
    pub dual_bound: Option<f64>,
    pub local_search: bool,
}

impl Default for GraspConfig {
    fn default() -> Self {
        GraspConfig {
            time_limit: 60.0,
            seed: 42,
            alpha_count: 10,
            reweight_period: 20,
            max_iterations: None,
            dual_bound: None,
            local_search: true,
        }
    }
}

/// How many constructed solutions violated each feasibility condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibilityCounts {
    pub not_partition: u64,
    pub disconnected: u64,
    pub over_capacity: u64,
    pub unbalanced: u64,
}

impl InfeasibilityCounts {
    fn record(&mut self, violations: &Violations) {
        self.not_partition += u64::from(violations.not_partition);
        self.disconnected += u64::from(violations.disconnected);
        self.over_capacity += u64::from(violations.over_capacity);
        self.unbalanced += u64::from(violations.unbalanced);
    }
}

/// Diagnostics for one alpha value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaStatistics {
    pub alpha: f64,
    pub probability: f64,
    pub samples: u64,
    pub mean_value: f64,
}

/// Counters and results of a search run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub iterations: u64,
    /// Feasible solutions obtained (constructed or repaired)
    pub solutions_found: u64,
    pub constructed_feasible: u64,
    pub repaired_feasible: u64,
    /// Constructions the repair pipeline could not make feasible
    pub unrepaired: u64,
    pub infeasibility: InfeasibilityCounts,
    pub interrupted_construction: u64,
    pub interrupted_repair: u64,
    pub interrupted_improvement: u64,
    pub improvements_run: u64,
    pub best_value: Option<f64>,
    pub best_iteration: Option<u64>,
    pub best_time: Option<f64>,
    pub dual_bound: Option<f64>,
    pub elapsed: f64,
    /// Mean of `value before / value after` over local search runs
    pub improvement_ratio_mean: f64,
    pub improvement_ratio_std: f64,
    pub alphas: Vec<AlphaStatistics>,
}

impl SearchStatistics {
    pub fn is_feasible(&self) -> bool {
        self.best_value.is_some()
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.alphas.iter().map(|a| a.probability).collect()
    }

    pub fn sample_counts(&self) -> Vec<u64> {
        self.alphas.iter().map(|a| a.samples).collect()
    }

    pub fn mean_values(&self) -> Vec<f64> {
        self.alphas.iter().map(|a| a.mean_value).collect()
    }
}

/// Result of a solver run: the best feasible solution, if any, and statistics
#[derive(Debug, Clone)]
pub struct SolveOutcome<'a> {
    pub best: Option<Solution<'a>>,
    pub statistics: SearchStatistics,
}

/// Draw an index with probability proportional to `weights` (cumulative sum).
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || total <= 0.0 {
        return 0;
    }
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return i;
        }
    }
    weights.len() - 1
}

/// New selection probabilities: `mean / best` per alpha, renormalized.
/// Alphas never sampled keep a neutral quality of one.
pub fn reweight(stats: &[Statistics], best: f64) -> Option<Vec<f64>> {
    if best <= 0.0 || stats.is_empty() {
        return None;
    }
    let quality: Vec<f64> = stats.iter()
        .map(|s| if s.is_empty() { 1.0 } else { (s.mean() / best).max(0.0) })
        .collect();
    let total: f64 = quality.iter().sum();
    if total <= 0.0 {
        return None;
    }
    Some(quality.into_iter().map(|q| q / total).collect())
}

/// Whether local search may bring `value` up to `best`, given the
/// `before / after` ratios of past improvements: `value >= best * (mean - 2 std)`.
pub fn worth_improving(value: f64, best: f64, ratios: &Statistics) -> bool {
    value >= best * (ratios.mean() - 2.0 * ratios.std_dev())
}

/// Reactive GRASP solver
#[derive(Debug, Clone, Default)]
pub struct ReactiveGrasp {
    pub config: GraspConfig,
}

impl ReactiveGrasp {
    pub fn new(config: GraspConfig) -> Self {
        ReactiveGrasp { config }
    }

    pub fn run<'a>(&self, instance: &'a Instance) -> SolveOutcome<'a> {
        let config = &self.config;
        let mut ctx = SearchContext::new(config.seed, config.time_limit);
        let alpha_count = config.alpha_count.max(1);
        let period = config.reweight_period.max(1);

        let alphas: Vec<f64> = (1..=alpha_count).map(|i| i as f64 / alpha_count as f64).collect();
        let mut probabilities = vec![1.0 / alpha_count as f64; alpha_count];
        let mut alpha_stats = vec![Statistics::new(); alpha_count];
        let mut ratio = Statistics::new();

        let fixer = SolutionFixer::new();
        let local_search = LocalSearch::new();
        let mut stats = SearchStatistics { dual_bound: config.dual_bound, ..Default::default() };
        let mut best: Option<Solution<'a>> = None;

        log::info!(
            "reactive GRASP on {} (|E| = {}, m = {}): time limit {}s, seed {}, {} alphas",
            instance.name, instance.num_edges(), instance.num_districts(),
            config.time_limit, config.seed, alpha_count
        );

        loop {
            if ctx.is_expired() {
                break;
            }
            if config.max_iterations.is_some_and(|cap| stats.iterations >= cap) {
                break;
            }
            if let (Some(dual), Some(value)) = (config.dual_bound, stats.best_value) {
                if dual - value < 1.0 {
                    log::info!("gap closed: best {:.2}, dual bound {:.2}", value, dual);
                    break;
                }
            }
            stats.iterations += 1;
            let iteration = stats.iterations;

            let idx = sample_index(&probabilities, ctx.rng());
            let construction = SemiGreedyConstruction::new(alphas[idx]);
            let mut solution = construction.construct(instance, &mut ctx);
            if ctx.is_expired() && !solution.is_partition() {
                stats.interrupted_construction += 1;
                break;
            }

            let violations = solution.violations();
            let constructed_feasible = violations.is_feasible();
            if !constructed_feasible {
                stats.infeasibility.record(&violations);
                log::debug!("iteration {}: alpha {:.2} built an infeasible solution {:?}", iteration, alphas[idx], violations);
                solution = fixer.fix(solution, &ctx);
                if !solution.is_feasible() {
                    if ctx.is_expired() {
                        stats.interrupted_repair += 1;
                        break;
                    }
                    stats.unrepaired += 1;
                    continue;
                }
                stats.repaired_feasible += 1;
            } else {
                stats.constructed_feasible += 1;
            }
            stats.solutions_found += 1;

            let best_value = stats.best_value.unwrap_or(f64::NEG_INFINITY);
            let promising = stats.solutions_found <= period as u64
                || worth_improving(solution.value(), best_value, &ratio);
            if config.local_search && promising {
                let before = solution.value();
                solution = local_search.improve(solution, &mut ctx);
                stats.improvements_run += 1;
                if ctx.is_expired() {
                    log::warn!("time budget expired during local search at iteration {}", iteration);
                    stats.interrupted_improvement += 1;
                }
                if solution.value() > 0.0 {
                    ratio.record(before / solution.value());
                }
            }

            let value = solution.value();
            alpha_stats[idx].record(value);
            if value > best_value + EPS {
                log::info!("new best {:.2} at iteration {} ({:.2}s)", value, iteration, ctx.elapsed());
                stats.best_value = Some(value);
                stats.best_iteration = Some(iteration);
                stats.best_time = Some(ctx.elapsed());
                best = Some(solution);
            }

            if stats.solutions_found % period as u64 == 0 {
                if let Some(updated) = stats.best_value.and_then(|b| reweight(&alpha_stats, b)) {
                    log::debug!("reweighted alpha probabilities: {:?}", updated);
                    probabilities = updated;
                }
            }
        }

        stats.elapsed = ctx.elapsed();
        stats.improvement_ratio_mean = ratio.mean();
        stats.improvement_ratio_std = ratio.std_dev();
        stats.alphas = alphas.iter().zip(&probabilities).zip(&alpha_stats)
            .map(|((&alpha, &probability), s)| AlphaStatistics {
                alpha,
                probability,
                samples: s.count(),
                mean_value: s.mean(),
            })
            .collect();

        match stats.best_value {
            Some(value) => log::info!(
                "search finished after {} iterations in {:.2}s: best {:.2}",
                stats.iterations, stats.elapsed, value
            ),
            None => log::info!(
                "search finished after {} iterations in {:.2}s without a feasible solution",
                stats.iterations, stats.elapsed
            ),
        }

        SolveOutcome { best, statistics: stats }
    }
}

impl Solver for ReactiveGrasp {
    fn solve<'a>(&mut self, instance: &'a Instance) -> SolveOutcome<'a> {
        self.run(instance)
    }

    fn name(&self) -> &str {
        "Reactive GRASP"
    }
}
