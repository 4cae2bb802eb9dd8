//! Unit tests for the restricted master problem.

use cg_vrp::master::MasterProblem;
use cg_vrp::problem::{Arc, Node, Problem, WorkingGraph};
use cg_vrp::route::{Origin, RouteSet};
use cg_vrp::solver::SimplexSolver;

/// Two customers reachable individually or chained.
fn two_customer_setup() -> (Problem, WorkingGraph, RouteSet) {
    let nodes = vec![
        Node::source(0),
        Node::customer(1, 1.0),
        Node::customer(2, 1.0),
        Node::sink(9),
    ];
    let arcs = vec![
        Arc::new(0, 1, 10.0),
        Arc::new(0, 2, 10.0),
        Arc::new(1, 9, 10.0),
        Arc::new(2, 9, 10.0),
        Arc::new(1, 2, 1.0),
    ];
    let problem = Problem::new("two", nodes, arcs);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    pool.add_node_list(vec![0, 1, 9], &working, 0, Origin::Initial);
    pool.add_node_list(vec![0, 2, 9], &working, 0, Origin::Initial);
    (problem, working, pool)
}

#[test]
fn relaxed_solve_returns_covering_duals() {
    let (_, working, pool) = two_customer_setup();
    let mut master = MasterProblem::new(&working, &pool, None, &[], SimplexSolver::new());
    let (duals, objective) = master.solve(true, None).unwrap();
    assert!((objective - 40.0).abs() < 1e-6);
    assert!((duals.node(1) - 20.0).abs() < 1e-6);
    assert!((duals.node(2) - 20.0).abs() < 1e-6);
}

#[test]
fn update_never_worsens_relaxation() {
    let (_, working, mut pool) = two_customer_setup();
    let mut master = MasterProblem::new(&working, &pool, None, &[], SimplexSolver::new());
    let (_, before) = master.solve(true, None).unwrap();

    // A cheaper combined route dominates the two singles.
    pool.add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Exact);
    master.update(pool.len() - 1, pool.last().unwrap());
    let (_, after) = master.solve(true, None).unwrap();

    assert!(after <= before + 1e-9);
    assert!((after - 21.0).abs() < 1e-6);
}

#[test]
fn integer_extraction_selects_partition() {
    let (_, working, mut pool) = two_customer_setup();
    pool.add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Exact);
    let mut master = MasterProblem::new(&working, &pool, None, &[], SimplexSolver::new());
    let (cost, routes) = master.get_total_cost_and_routes(false, &pool, None).unwrap();

    assert!((cost - 21.0).abs() < 1e-6);
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].node_list(), &[0, 1, 2, 9]);
}

#[test]
fn heuristic_distribution_buckets_origins() {
    let (_, working, mut pool) = two_customer_setup();
    pool.add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Exact);
    let mut master = MasterProblem::new(&working, &pool, None, &[], SimplexSolver::new());
    master.solve(true, None).unwrap();
    let (active, distribution) = master.get_heuristic_distribution(&pool);
    assert_eq!(active.len(), distribution.total());
    assert_eq!(distribution.exact, 1);
}

#[test]
fn vehicle_bound_artificial_keeps_relaxation_feasible() {
    let (_, working, pool) = two_customer_setup();
    // Zero vehicles of the only type: infeasible without the slack.
    let mut master = MasterProblem::new(&working, &pool, None, &[0], SimplexSolver::new());
    let (_, objective) = master.solve(true, None).unwrap();
    assert!(objective > 1e5);
}

#[test]
fn vehicle_bound_duals_are_exposed() {
    let (_, working, pool) = two_customer_setup();
    // One vehicle for two customers: the bound binds and prices routes.
    let mut master = MasterProblem::new(&working, &pool, None, &[1], SimplexSolver::new());
    let (duals, _) = master.solve(true, None).unwrap();
    // A binding upper bound carries a non-positive dual in a minimization.
    assert!(duals.vehicle_type(0) <= 1e-9);
}

#[test]
fn drop_penalty_allows_uncovered_customers() {
    let nodes = vec![Node::source(0), Node::customer(1, 1.0), Node::sink(9)];
    // Serving customer 1 costs 40, dropping it only 15.
    let arcs = vec![Arc::new(0, 1, 20.0), Arc::new(1, 9, 20.0)];
    let problem = Problem::new("droppable", nodes, arcs);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    pool.add_node_list(vec![0, 1, 9], &working, 0, Origin::Initial);

    let mut master = MasterProblem::new(&working, &pool, Some(15.0), &[], SimplexSolver::new());
    let (cost, routes) = master.get_total_cost_and_routes(false, &pool, None).unwrap();
    assert!((cost - 15.0).abs() < 1e-6);
    assert!(routes.is_empty());
    assert_eq!(master.dropped_nodes, vec![1]);
}
