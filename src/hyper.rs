//! Adaptive selection of the pricing strategy.
//!
//! A hyper-heuristic in two phases. The first call fixes the baseline
//! objective and forces `BestPaths`; every later call measures how the
//! previously chosen strategy performed, runs a simulated-annealing style
//! move acceptance, refreshes the per-strategy selection scores and picks
//! the strategy with the best score. Scores combine observed quality with
//! an exploration bonus that favors rarely tried strategies, so no
//! strategy starves.

use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::master::HeuristicDistribution;
use crate::pricing::StrategyKind;

/// Placeholder score for strategies that have never run; guarantees each
/// one is tried before any score comparison matters.
const UNTRIED_POINTS: f64 = 1e10;

/// Lower bound for the acceptance threshold decay.
const THETA_FLOOR: f64 = 1e-3;

/// Multiplicative decay applied to the acceptance threshold per call.
const THETA_DECAY: f64 = 0.9;

/// How the per-strategy quality is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceMeasure {
    /// Accumulated relative objective improvement per use.
    RelativeImprovement,
    /// Blend of improvement, success rate, runtime and active columns.
    WeightedAverage,
}

/// Bookkeeping for one strategy.
#[derive(Debug, Clone, Default)]
pub struct StrategyRecord {
    /// Times this strategy was charged with an iteration.
    pub uses: u32,
    /// Columns it produced that were added to the master.
    pub accepted_columns: u32,
    /// Its routes active in the latest master solution.
    pub active_routes: u32,
    /// Mean relative improvement per use.
    pub average_improvement: f64,
    /// Accumulated improvement of accepted moves.
    pub total_improvement: f64,
    /// Quality score feeding the selection points.
    pub quality: f64,
    /// Selection score: quality plus exploration bonus.
    pub points: f64,
    /// Wall-clock spent in this strategy's pricing attempts.
    pub total_runtime: Duration,
}

/// Run-scoped adaptive strategy selector.
///
/// Reset (rebuilt) at the start of each solve; nothing persists across
/// runs.
pub struct HyperHeuristic {
    pub measure: PerformanceMeasure,
    scaling_factor: f64,
    theta: f64,
    initialisation: bool,
    current_objective: f64,
    new_objective: f64,
    last_improvement: f64,
    iteration: u64,
    records: [StrategyRecord; 4],
    current: StrategyKind,
    started_at: Option<Instant>,
    /// Exploration bonus of the strategy picked last, for diagnostics.
    pub last_exploration: f64,
    /// Exact pricing invocations while under adaptive control.
    pub n_exact: u32,
    rng: ChaCha8Rng,
}

impl HyperHeuristic {
    pub fn new(measure: PerformanceMeasure, scaling_factor: f64, rng: ChaCha8Rng) -> Self {
        let records = std::array::from_fn(|_| StrategyRecord {
            points: UNTRIED_POINTS,
            ..StrategyRecord::default()
        });
        HyperHeuristic {
            measure,
            scaling_factor,
            theta: 0.7,
            initialisation: true,
            current_objective: f64::INFINITY,
            new_objective: f64::INFINITY,
            last_improvement: 0.0,
            iteration: 0,
            records,
            current: StrategyKind::BestPaths,
            started_at: None,
            last_exploration: 0.0,
            n_exact: 0,
            rng,
        }
    }

    pub fn is_initialisation(&self) -> bool {
        self.initialisation
    }

    /// First call of a run: record the baseline and force `BestPaths`.
    pub fn initialise(&mut self, objective: f64) -> StrategyKind {
        self.current_objective = objective;
        self.new_objective = objective;
        self.started_at = Some(Instant::now());
        self.initialisation = false;
        self.current = StrategyKind::BestPaths;
        self.current
    }

    /// Observe the outcome of the last iteration: the fresh relaxed
    /// objective, whether the charged strategy produced a column, and the
    /// active-column distribution of the master solution.
    pub fn current_performance(
        &mut self,
        new_objective: f64,
        produced_column: bool,
        active: &HeuristicDistribution,
    ) {
        self.iteration += 1;
        self.new_objective = new_objective;
        self.last_improvement = if self.current_objective.abs() > f64::EPSILON {
            (self.current_objective - new_objective) / self.current_objective * 100.0
        } else {
            0.0
        };

        let record = &mut self.records[self.current.index()];
        if produced_column {
            record.accepted_columns += 1;
        }
        self.records[StrategyKind::BestPaths.index()].active_routes = active.best_paths as u32;
        self.records[StrategyKind::BestEdges1.index()].active_routes = active.best_edges1 as u32;
        self.records[StrategyKind::BestEdges2.index()].active_routes = active.best_edges2 as u32;
        self.records[StrategyKind::Exact.index()].active_routes = active.exact as u32;
    }

    /// Charge the wall-clock of a pricing attempt to a strategy.
    pub fn record_runtime(&mut self, strategy: StrategyKind, runtime: Duration) {
        self.records[strategy.index()].total_runtime += runtime;
        if strategy == StrategyKind::Exact {
            self.n_exact += 1;
        }
    }

    /// Simulated-annealing style move acceptance.
    ///
    /// Improving moves are always accepted and move the baseline.
    /// Non-improving moves are accepted with probability `exp(r)` (with
    /// `r` the non-positive relative improvement in percent), floored at
    /// the decaying threshold.
    pub fn move_acceptance(&mut self) -> bool {
        let r = self.last_improvement;
        if self.new_objective < self.current_objective {
            let record = &mut self.records[self.current.index()];
            record.total_improvement += r;
            self.current_objective = self.new_objective;
            true
        } else {
            let probability = r.exp().max(self.theta).min(1.0);
            self.rng.gen::<f64>() < probability
        }
    }

    /// Refresh quality, selection scores and the acceptance threshold.
    pub fn update_parameters(&mut self) {
        let index = self.current.index();
        self.records[index].uses += 1;

        {
            let record = &mut self.records[index];
            record.average_improvement = record.total_improvement / record.uses as f64;
        }

        match self.measure {
            PerformanceMeasure::RelativeImprovement => {
                let record = &mut self.records[index];
                record.quality = (record.quality + record.average_improvement) / record.uses as f64;
            }
            PerformanceMeasure::WeightedAverage => self.update_weighted_quality(),
        }

        let total_uses: u32 = self.records.iter().map(|r| r.uses).sum();
        for (j, record) in self.records.iter_mut().enumerate() {
            if record.uses > 0 {
                let exploration = self.scaling_factor
                    * (2.0 * (total_uses as f64).ln() / record.uses as f64).sqrt();
                record.points = record.quality + exploration;
                if j == index {
                    self.last_exploration = exploration;
                }
            }
        }

        self.theta = (self.theta * THETA_DECAY).max(THETA_FLOOR);
    }

    fn update_weighted_quality(&mut self) {
        let max_improvement = self
            .records
            .iter()
            .map(|r| r.average_improvement.abs())
            .fold(0.0, f64::max);
        let max_runtime = self
            .records
            .iter()
            .filter(|r| r.uses > 0)
            .map(|r| r.total_runtime.as_secs_f64() / r.uses as f64)
            .fold(0.0, f64::max);
        let total_active: u32 = self.records.iter().map(|r| r.active_routes).sum();

        let index = self.current.index();
        let record = &mut self.records[index];

        let improvement = if max_improvement > 0.0 {
            record.average_improvement / max_improvement
        } else {
            0.0
        };
        let success = record.accepted_columns as f64 / record.uses as f64;
        let runtime_share = if max_runtime > 0.0 {
            (record.total_runtime.as_secs_f64() / record.uses as f64) / max_runtime
        } else {
            0.0
        };
        let active_share = if total_active > 0 {
            record.active_routes as f64 / total_active as f64
        } else {
            0.0
        };

        record.quality = 0.4 * improvement + 0.3 * success + 0.2 * (1.0 - runtime_share)
            + 0.1 * active_share;
    }

    /// Pick the strategy with the best selection score; ties break
    /// uniformly at random.
    pub fn pick_heuristic(&mut self) -> StrategyKind {
        let best = self
            .records
            .iter()
            .map(|r| r.points)
            .fold(f64::NEG_INFINITY, f64::max);
        let candidates: Vec<StrategyKind> = StrategyKind::ALL
            .into_iter()
            .filter(|s| (self.records[s.index()].points - best).abs() < 1e-12)
            .collect();

        self.current = if candidates.len() == 1 {
            candidates[0]
        } else {
            candidates[self.rng.gen_range(0..candidates.len())]
        };
        debug!(
            "hyper-heuristic picks {} (points {:.4}, theta {:.4})",
            self.current, best, self.theta
        );
        self.current
    }

    pub fn current_strategy(&self) -> StrategyKind {
        self.current
    }

    /// Steady-state calls observed so far.
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Time since initialisation; `None` before the first call.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| start.elapsed())
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn record(&self, strategy: StrategyKind) -> &StrategyRecord {
        &self.records[strategy.index()]
    }

    /// Mean pricing runtime over every charged attempt.
    pub fn average_runtime(&self) -> f64 {
        let uses: u32 = self.records.iter().map(|r| r.uses).sum();
        if uses == 0 {
            return 0.0;
        }
        let total: f64 = self
            .records
            .iter()
            .map(|r| r.total_runtime.as_secs_f64())
            .sum();
        total / uses as f64
    }
}
