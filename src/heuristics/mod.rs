//! Heuristics for edge districting.
//!
//! This module exports the construction, repair and improvement heuristics
//! and the reactive GRASP driver that combines them, together with the
//! [`SearchContext`] every component draws its deadline and randomness from.

pub mod assignment;
pub mod construction;
pub mod fixer;
pub mod grasp;
pub mod local_search;

pub use construction::*;
pub use fixer::*;
pub use grasp::*;
pub use local_search::*;

use crate::instance::Instance;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Deadline and seeded random generator shared by one search run
#[derive(Debug, Clone)]
pub struct SearchContext {
    start: Instant,
    time_limit: Duration,
    rng: ChaCha8Rng,
}

impl SearchContext {
    /// New context whose deadline is `time_limit` seconds from now
    pub fn new(seed: u64, time_limit: f64) -> Self {
        SearchContext {
            start: Instant::now(),
            time_limit: Duration::from_secs_f64(time_limit.max(0.0)),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Seconds left before the deadline (0 once expired)
    pub fn remaining(&self) -> f64 {
        self.time_limit.saturating_sub(self.start.elapsed()).as_secs_f64()
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.time_limit
    }

    #[inline]
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// Builds a solution from scratch
pub trait ConstructionHeuristic {
    fn construct<'a>(&self, instance: &'a Instance, ctx: &mut SearchContext) -> Solution<'a>;
    fn name(&self) -> &str;
}

/// Transforms a solution into another one, taking ownership while it works
pub trait ImprovementHeuristic {
    fn improve<'a>(&self, solution: Solution<'a>, ctx: &mut SearchContext) -> Solution<'a>;
    fn name(&self) -> &str;
}

/// Complete solving method over an instance
pub trait Solver {
    fn solve<'a>(&mut self, instance: &'a Instance) -> SolveOutcome<'a>;
    fn name(&self) -> &str;
}
