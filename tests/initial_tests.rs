//! Unit tests for the initial-solution constructions.

use cg_vrp::initial::{
    check_initial_routes, greedy_construction, round_trips, ClarkeWright,
};
use cg_vrp::problem::{Arc, Node, Problem, WorkingGraph};

/// Three customers around a depot with chaining arcs.
fn triangle() -> Problem {
    let nodes = vec![
        Node::source(0),
        Node::customer(1, 2.0),
        Node::customer(2, 2.0),
        Node::customer(3, 2.0),
        Node::sink(9),
    ];
    let mut arcs = Vec::new();
    for c in 1..=3 {
        arcs.push(Arc::new(0, c, 10.0));
        arcs.push(Arc::new(c, 9, 10.0));
    }
    arcs.push(Arc::new(1, 2, 3.0));
    arcs.push(Arc::new(2, 3, 3.0));
    arcs.push(Arc::new(1, 3, 4.0));
    Problem::new("triangle", nodes, arcs)
}

#[test]
fn clarke_wright_merges_into_single_route() {
    let problem = triangle();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let construction = ClarkeWright::new(1.0).run(&working);
    // With no constraints the savings chain everything together.
    assert_eq!(construction.routes.len(), 1);
    assert_eq!(construction.routes[0].first(), Some(&0));
    assert_eq!(construction.routes[0].last(), Some(&9));
    assert_eq!(construction.routes[0].len(), 5);
}

#[test]
fn clarke_wright_respects_capacity() {
    let problem = triangle().with_load_capacity(4.0);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let construction = ClarkeWright::new(1.0)
        .with_capacity(Some(4.0))
        .run(&working);
    // Routes of at most two customers, all three covered.
    for route in &construction.routes {
        assert!(route.len() <= 4);
    }
    let visited: usize = construction.routes.iter().map(|r| r.len() - 2).sum();
    assert_eq!(visited, 3);
}

#[test]
fn clarke_wright_respects_stop_limit() {
    let problem = triangle();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let construction = ClarkeWright::new(1.0)
        .with_num_stops(Some(1))
        .run(&working);
    assert_eq!(construction.routes.len(), 3);
    for route in &construction.routes {
        assert_eq!(route.len(), 3);
    }
}

#[test]
fn round_trips_cover_every_customer() {
    let problem = triangle();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let routes = round_trips(&working);
    assert_eq!(routes.len(), 3);
    for route in &routes {
        assert_eq!(route.len(), 3);
    }
    assert!(check_initial_routes(&routes, &working).is_ok());
}

#[test]
fn greedy_construction_partitions_customers() {
    let problem = triangle().with_load_capacity(4.0);
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let construction = greedy_construction(&working, Some(4.0), None, None);
    let visited: usize = construction.routes.iter().map(|r| r.len() - 2).sum();
    assert_eq!(visited, 3);
}

#[test]
fn initial_route_validation_rejects_uncovered_customer() {
    let problem = triangle();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    assert!(check_initial_routes(&[vec![0, 1, 9]], &working).is_err());
}

#[test]
fn initial_route_validation_rejects_missing_arc() {
    let problem = triangle();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    // Arc (3, 1) does not exist.
    let routes = vec![vec![0, 3, 1, 9], vec![0, 2, 9]];
    assert!(check_initial_routes(&routes, &working).is_err());
}
