//! Unit tests for the pricing oracle: filters, labeling and the sweeps.

use cg_vrp::master::Duals;
use cg_vrp::pricing::{labeling, PricingGraph, PricingOracle, ResourceLimits, StrategyKind};
use cg_vrp::problem::{Arc, Node, Problem, WorkingGraph};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Two customers with a chain arc and an expensive detour arc.
fn sweep_problem() -> Problem {
    let nodes = vec![
        Node::source(0),
        Node::customer(1, 1.0),
        Node::customer(2, 1.0),
        Node::sink(9),
    ];
    let arcs = vec![
        Arc::new(0, 1, 10.0),
        Arc::new(0, 2, 10.0),
        Arc::new(1, 2, 2.0),
        // Expensive detour; the filters should drop this one first.
        Arc::new(2, 1, 50.0),
        Arc::new(1, 9, 10.0),
        Arc::new(2, 9, 10.0),
    ];
    Problem::new("sweep", nodes, arcs)
}

fn duals_of(value: f64) -> Duals {
    let mut duals = Duals::default();
    duals.set_node(1, value);
    duals.set_node(2, value);
    duals
}

#[test]
fn weights_without_duals_equal_costs() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let pricing = PricingGraph::build(&working, &Duals::default(), 0);
    for edge in pricing.graph.edge_indices() {
        assert_eq!(pricing.graph[edge].weight, pricing.graph[edge].cost);
    }
}

#[test]
fn vehicle_dual_charges_source_arcs() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut duals = Duals::default();
    duals.set_vehicle_types(vec![-3.0]);
    let pricing = PricingGraph::build(&working, &duals, 0);

    let source_out = pricing
        .graph
        .edge_indices()
        .filter(|&e| {
            let (from, _) = pricing.graph.edge_endpoints(e).unwrap();
            from == pricing.source
        })
        .count();
    assert!(source_out > 0);
    for edge in pricing.graph.edge_indices() {
        let (from, _) = pricing.graph.edge_endpoints(edge).unwrap();
        let arc = pricing.graph[edge];
        if from == pricing.source {
            assert!((arc.weight - (arc.cost + 3.0)).abs() < 1e-9);
        }
    }
}

#[test]
fn labeling_finds_negative_reduced_cost_path() {
    let nodes = vec![Node::source(0), Node::customer(1, 1.0), Node::sink(9)];
    let arcs = vec![Arc::new(0, 1, 10.0), Arc::new(1, 9, 10.0)];
    let problem = Problem::new("single", nodes, arcs);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut duals = Duals::default();
    duals.set_node(1, 25.0);
    let pricing = PricingGraph::build(&working, &duals, 0);

    let paths = labeling::search(&pricing, &ResourceLimits::default(), None, 10_000);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].nodes, vec![0, 1, 9]);
    assert!((paths[0].cost - 20.0).abs() < 1e-9);
    assert!((paths[0].reduced_cost + 5.0).abs() < 1e-9);
}

#[test]
fn labeling_respects_capacity() {
    let nodes = vec![Node::source(0), Node::customer(1, 8.0), Node::sink(9)];
    let arcs = vec![Arc::new(0, 1, 1.0), Arc::new(1, 9, 1.0)];
    let problem = Problem::new("heavy", nodes, arcs);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut duals = Duals::default();
    duals.set_node(1, 100.0);
    let pricing = PricingGraph::build(&working, &duals, 0);

    let limits = ResourceLimits {
        capacity: Some(5.0),
        ..ResourceLimits::default()
    };
    assert!(labeling::search(&pricing, &limits, None, 10_000).is_empty());
}

#[test]
fn labeling_respects_stop_limit() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let pricing = PricingGraph::build(&working, &duals_of(50.0), 0);

    let limits = ResourceLimits {
        num_stops: Some(1),
        ..ResourceLimits::default()
    };
    let paths = labeling::search(&pricing, &limits, None, 10_000);
    assert!(!paths.is_empty());
    for path in &paths {
        assert!(path.nodes.len() <= 3);
    }
}

#[test]
fn best_edges2_drops_heaviest_fraction() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let pricing = PricingGraph::build(&working, &Duals::default(), 0);
    let restricted = pricing.best_edges2(0.1);
    // One of seven arcs goes: the 50-cost detour.
    assert_eq!(restricted.graph.edge_count(), pricing.graph.edge_count() - 1);
    let from = restricted
        .graph
        .node_indices()
        .find(|&v| restricted.graph[v].id == 2)
        .unwrap();
    let to = restricted
        .graph
        .node_indices()
        .find(|&v| restricted.graph[v].id == 1)
        .unwrap();
    assert!(restricted.graph.find_edge(from, to).is_none());
}

#[test]
fn exact_finds_best_column() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let oracle = PricingOracle::new(&working, &problem);
    let (paths, found) = oracle.solve(&duals_of(30.0), 0, StrategyKind::Exact, None);
    assert!(found);
    // The best column visits both customers.
    assert_eq!(paths[0].nodes, vec![0, 1, 2, 9]);
}

#[test]
fn every_strategy_fails_on_hopeless_duals() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let oracle = PricingOracle::new(&working, &problem);
    for strategy in StrategyKind::ALL {
        let (paths, found) = oracle.solve(&duals_of(0.0), 0, strategy, None);
        assert!(!found, "{} should fail", strategy);
        assert!(paths.is_empty());
    }
}

#[test]
fn sweep_strategies_find_column_when_profitable() {
    let problem = sweep_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let oracle = PricingOracle::new(&working, &problem);
    for strategy in [
        StrategyKind::BestPaths,
        StrategyKind::BestEdges1,
        StrategyKind::BestEdges2,
    ] {
        let (paths, found) = oracle.solve(&duals_of(30.0), 0, strategy, None);
        assert!(found, "{} should succeed", strategy);
        assert!(paths[0].reduced_cost < 0.0);
    }
}

#[test]
fn greedy_prepass_finds_obvious_column() {
    let nodes = vec![Node::source(0), Node::customer(1, 1.0), Node::sink(9)];
    let arcs = vec![Arc::new(0, 1, 1.0), Arc::new(1, 9, 1.0)];
    let problem = Problem::new("tiny", nodes, arcs);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut duals = Duals::default();
    duals.set_node(1, 10.0);

    let oracle = PricingOracle::new(&working, &problem);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let paths = oracle.solve_greedy(&duals, 0, &mut rng);
    assert!(!paths.is_empty());
    assert_eq!(paths[0].nodes, vec![0, 1, 9]);
    assert!(paths[0].reduced_cost < 0.0);
}

#[test]
fn strategy_names_are_stable() {
    assert_eq!(StrategyKind::BestPaths.name(), "BestPaths");
    assert_eq!(StrategyKind::BestEdges1.name(), "BestEdges1");
    assert_eq!(StrategyKind::BestEdges2.name(), "BestEdges2");
    assert_eq!(StrategyKind::Exact.name(), "Exact");
}
