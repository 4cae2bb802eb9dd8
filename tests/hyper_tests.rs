//! Unit tests for the adaptive strategy selector.

use cg_vrp::hyper::{HyperHeuristic, PerformanceMeasure};
use cg_vrp::master::HeuristicDistribution;
use cg_vrp::pricing::StrategyKind;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

fn fresh(measure: PerformanceMeasure) -> HyperHeuristic {
    HyperHeuristic::new(measure, 0.5, ChaCha8Rng::seed_from_u64(42))
}

#[test]
fn first_call_forces_best_paths() {
    for objective in [0.0, 1.0, 1e9, -5.0] {
        let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
        assert!(hyper.is_initialisation());
        assert_eq!(hyper.initialise(objective), StrategyKind::BestPaths);
        assert!(!hyper.is_initialisation());
    }
}

#[test]
fn improving_move_is_always_accepted() {
    let mut hyper = fresh(PerformanceMeasure::RelativeImprovement);
    hyper.initialise(100.0);
    hyper.current_performance(90.0, true, &HeuristicDistribution::default());
    assert!(hyper.move_acceptance());
}

#[test]
fn equal_objective_is_accepted_via_exp_zero() {
    let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
    hyper.initialise(100.0);
    hyper.current_performance(100.0, false, &HeuristicDistribution::default());
    // exp(0) = 1: a stagnating move is always accepted.
    assert!(hyper.move_acceptance());
}

#[test]
fn untried_strategies_are_explored_first() {
    let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
    hyper.initialise(100.0);

    let mut seen = HashSet::new();
    seen.insert(StrategyKind::BestPaths);
    for _ in 0..3 {
        hyper.current_performance(100.0, false, &HeuristicDistribution::default());
        hyper.move_acceptance();
        hyper.update_parameters();
        let picked = hyper.pick_heuristic();
        assert!(
            seen.insert(picked),
            "{} was picked again before all strategies were tried",
            picked
        );
    }
    assert_eq!(seen.len(), 4);
}

#[test]
fn theta_decays_towards_floor() {
    let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
    hyper.initialise(100.0);
    let before = hyper.theta();
    for _ in 0..200 {
        hyper.current_performance(100.0, false, &HeuristicDistribution::default());
        hyper.move_acceptance();
        hyper.update_parameters();
        hyper.pick_heuristic();
    }
    assert!(hyper.theta() < before);
    assert!(hyper.theta() > 0.0);
}

#[test]
fn successful_strategy_outscores_failing_one() {
    let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
    hyper.initialise(100.0);

    // BestPaths improves whenever charged; the rest stagnate without
    // producing columns.
    let mut objective = 100.0;
    for _ in 0..8 {
        let produced = hyper.current_strategy() == StrategyKind::BestPaths;
        if produced {
            objective -= 5.0;
        }
        hyper.current_performance(objective, produced, &HeuristicDistribution::default());
        hyper.move_acceptance();
        hyper.update_parameters();
        hyper.pick_heuristic();
    }

    let best_paths = hyper.record(StrategyKind::BestPaths);
    let best_edges2 = hyper.record(StrategyKind::BestEdges2);
    assert!(best_paths.quality > best_edges2.quality);
}

#[test]
fn runtime_is_charged_to_the_strategy() {
    let mut hyper = fresh(PerformanceMeasure::WeightedAverage);
    hyper.initialise(100.0);
    hyper.record_runtime(StrategyKind::BestPaths, std::time::Duration::from_millis(50));
    hyper.record_runtime(StrategyKind::Exact, std::time::Duration::from_millis(10));
    assert_eq!(
        hyper.record(StrategyKind::BestPaths).total_runtime,
        std::time::Duration::from_millis(50)
    );
    assert_eq!(hyper.n_exact, 1);
}

#[test]
fn relative_improvement_rewards_accepted_gains() {
    let mut hyper = fresh(PerformanceMeasure::RelativeImprovement);
    hyper.initialise(100.0);
    hyper.current_performance(80.0, true, &HeuristicDistribution::default());
    hyper.move_acceptance();
    hyper.update_parameters();
    let record = hyper.record(StrategyKind::BestPaths);
    assert!(record.average_improvement > 0.0);
    assert!(record.quality > 0.0);
}
