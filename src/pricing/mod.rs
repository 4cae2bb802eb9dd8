//! Pricing subproblem: search for negative-reduced-cost routes.
//!
//! The oracle runs one of four strategies. The heuristic ones search a
//! restricted subgraph and sweep an ordered list of increasingly permissive
//! parameters, stopping at the first that yields a column; `Exact` searches
//! the full graph in a single call and is the only strategy whose empty
//! answer certifies that no improving column exists.

pub mod filters;
pub mod greedy;
pub mod labeling;

use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::master::Duals;
use crate::problem::{Problem, WorkingGraph};
use crate::route::Origin;

pub use filters::PricingGraph;
pub use labeling::{PricedPath, ResourceLimits};

/// The closed set of pricing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    BestPaths,
    BestEdges1,
    BestEdges2,
    Exact,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::BestPaths,
        StrategyKind::BestEdges1,
        StrategyKind::BestEdges2,
        StrategyKind::Exact,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::BestPaths => "BestPaths",
            StrategyKind::BestEdges1 => "BestEdges1",
            StrategyKind::BestEdges2 => "BestEdges2",
            StrategyKind::Exact => "Exact",
        }
    }

    /// Position in [`StrategyKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            StrategyKind::BestPaths => 0,
            StrategyKind::BestEdges1 => 1,
            StrategyKind::BestEdges2 => 2,
            StrategyKind::Exact => 3,
        }
    }

    /// The origin tag stamped on routes this strategy produces.
    pub fn origin(self) -> Origin {
        match self {
            StrategyKind::BestPaths => Origin::BestPaths,
            StrategyKind::BestEdges1 => Origin::BestEdges1,
            StrategyKind::BestEdges2 => Origin::BestEdges2,
            StrategyKind::Exact => Origin::Exact,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered sweep of path counts for `BestPaths`.
const BEST_PATHS_SWEEP: [usize; 4] = [3, 5, 7, 9];
/// Ordered sweep of weight-threshold factors for `BestEdges1`.
const BEST_EDGES1_SWEEP: [f64; 4] = [0.3, 0.5, 0.7, 0.9];
/// Ordered sweep of removal ratios for `BestEdges2`.
const BEST_EDGES2_SWEEP: [f64; 3] = [0.1, 0.2, 0.3];

/// Label arena cap per search.
const MAX_LABELS: usize = 200_000;

/// The pricing subproblem over one working graph.
pub struct PricingOracle<'a> {
    working: &'a WorkingGraph,
    load_capacity: &'a [f64],
    duration: Option<f64>,
    time_windows: bool,
}

impl<'a> PricingOracle<'a> {
    pub fn new(working: &'a WorkingGraph, problem: &'a Problem) -> Self {
        PricingOracle {
            working,
            load_capacity: &problem.load_capacity,
            duration: problem.duration,
            time_windows: problem.time_windows,
        }
    }

    fn limits_for(&self, vehicle_type: usize) -> ResourceLimits {
        ResourceLimits {
            num_stops: self.working.num_stops,
            capacity: self.load_capacity.get(vehicle_type).copied(),
            duration: self.duration,
            time_windows: self.time_windows,
        }
    }

    /// Attempt to price columns for one vehicle type with one strategy.
    ///
    /// Returns the routes found (best reduced cost first) and whether the
    /// attempt succeeded. A failed sweep returns `(vec![], false)`.
    pub fn solve(
        &self,
        duals: &Duals,
        vehicle_type: usize,
        strategy: StrategyKind,
        time_remaining: Option<Duration>,
    ) -> (Vec<PricedPath>, bool) {
        let deadline = time_remaining.map(|remaining| Instant::now() + remaining);
        let pricing = PricingGraph::build(self.working, duals, vehicle_type);
        let limits = self.limits_for(vehicle_type);

        match strategy {
            StrategyKind::Exact => {
                debug!("run exact pricing for vehicle type {}", vehicle_type);
                let paths = labeling::search(&pricing, &limits, deadline, MAX_LABELS);
                let found = !paths.is_empty();
                (paths, found)
            }
            StrategyKind::BestPaths => {
                for &k in &BEST_PATHS_SWEEP {
                    let restricted = pricing.best_paths(k);
                    let paths = labeling::search(&restricted, &limits, deadline, MAX_LABELS);
                    if !paths.is_empty() {
                        debug!("BestPaths succeeded at k = {}", k);
                        return (paths, true);
                    }
                }
                (Vec::new(), false)
            }
            StrategyKind::BestEdges1 => {
                for &alpha in &BEST_EDGES1_SWEEP {
                    let restricted = pricing.best_edges1(alpha);
                    let paths = labeling::search(&restricted, &limits, deadline, MAX_LABELS);
                    if !paths.is_empty() {
                        debug!("BestEdges1 succeeded at alpha = {}", alpha);
                        return (paths, true);
                    }
                }
                (Vec::new(), false)
            }
            StrategyKind::BestEdges2 => {
                for &ratio in &BEST_EDGES2_SWEEP {
                    let restricted = pricing.best_edges2(ratio);
                    let paths = labeling::search(&restricted, &limits, deadline, MAX_LABELS);
                    if !paths.is_empty() {
                        debug!("BestEdges2 succeeded at ratio = {}", ratio);
                        return (paths, true);
                    }
                }
                (Vec::new(), false)
            }
        }
    }

    /// Randomized greedy pre-pass; every route returned is a column.
    pub fn solve_greedy<R: Rng>(
        &self,
        duals: &Duals,
        vehicle_type: usize,
        rng: &mut R,
    ) -> Vec<PricedPath> {
        let pricing = PricingGraph::build(self.working, duals, vehicle_type);
        let limits = self.limits_for(vehicle_type);
        greedy::search(&pricing, &limits, greedy::DEFAULT_RUNS, rng)
    }
}
