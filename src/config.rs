//! Configuration for a solve call.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hyper::PerformanceMeasure;
use crate::pricing::StrategyKind;

/// How the pricing strategy is chosen each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingMode {
    /// Always attempt the given strategy, escalating to `Exact` when it
    /// fails to produce a column.
    Fixed(StrategyKind),
    /// Let the hyper-heuristic pick the strategy adaptively.
    Adaptive,
}

/// Settings for [`crate::VehicleRoutingProblem::solve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Strategy selection mode.
    pub pricing: PricingMode,
    /// Quality measure used by the adaptive selector.
    pub performance_measure: PerformanceMeasure,
    /// Wall-clock budget for the whole solve.
    pub time_limit: Option<Duration>,
    /// Finish with the diving heuristic instead of the integer re-solve.
    pub dive: bool,
    /// Run the randomized greedy pre-pass each iteration.
    pub greedy: bool,
    /// Explicit cap on column-generation iterations.
    pub max_iterations: Option<u64>,
    /// Seed for the adaptive selector and the greedy pre-pass.
    pub seed: u64,
    /// Scaling factor balancing exploration against exploitation.
    pub scaling_factor: f64,
    /// Optional CSV run log (adaptive mode only).
    pub run_log: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            pricing: PricingMode::Fixed(StrategyKind::BestEdges1),
            performance_measure: PerformanceMeasure::WeightedAverage,
            time_limit: None,
            dive: false,
            greedy: false,
            max_iterations: None,
            seed: 1,
            scaling_factor: 0.5,
            run_log: None,
        }
    }
}

impl SolverConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        SolverConfig::default()
    }

    /// Use a fixed pricing strategy.
    pub fn with_pricing_strategy(mut self, strategy: StrategyKind) -> Self {
        self.pricing = PricingMode::Fixed(strategy);
        self
    }

    /// Let the hyper-heuristic pick strategies.
    pub fn with_adaptive_pricing(mut self) -> Self {
        self.pricing = PricingMode::Adaptive;
        self
    }

    /// Set the quality measure for the adaptive selector.
    pub fn with_performance_measure(mut self, measure: PerformanceMeasure) -> Self {
        self.performance_measure = measure;
        self
    }

    /// Set the time limit.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Finish with the diving heuristic.
    pub fn with_dive(mut self) -> Self {
        self.dive = true;
        self
    }

    /// Enable the randomized greedy pre-pass.
    pub fn with_greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Cap the number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the exploration scaling factor.
    pub fn with_scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }

    /// Write the per-iteration run log to the given CSV file.
    pub fn with_run_log(mut self, path: PathBuf) -> Self {
        self.run_log = Some(path);
        self
    }
}
