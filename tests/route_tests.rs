//! Unit tests for routes and the route pool.

use cg_vrp::problem::{Arc, Node, Problem, WorkingGraph};
use cg_vrp::route::{Origin, RouteSet};

/// Source 0, two customers, sink 9, with service times and travel times.
fn line_problem() -> Problem {
    let nodes = vec![
        Node::source(0),
        Node::customer(1, 2.0).with_service_time(1.0),
        Node::customer(2, 3.0).with_service_time(1.0),
        Node::sink(9),
    ];
    let arcs = vec![
        Arc::new(0, 1, 5.0).with_time(5.0),
        Arc::new(1, 2, 4.0).with_time(4.0),
        Arc::new(2, 9, 6.0).with_time(6.0),
    ];
    Problem::new("line", nodes, arcs)
}

#[test]
fn node_list_round_trip() {
    let problem = line_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    let nodes = vec![0, 1, 2, 9];
    let route = pool
        .add_node_list(nodes.clone(), &working, 0, Origin::Initial)
        .unwrap();
    // Converting back yields the identical sequence.
    assert_eq!(route.node_list(), nodes.as_slice());
    assert_eq!(route.customers(), &[1, 2]);
    assert!((route.cost - 15.0).abs() < 1e-9);
}

#[test]
fn missing_arc_makes_route_unpriceable() {
    let problem = line_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    assert!(pool
        .add_node_list(vec![0, 2, 1, 9], &working, 0, Origin::Initial)
        .is_none());
    assert!(pool.is_empty());
}

#[test]
fn route_queries_match_instance_data() {
    let problem = line_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    let route = pool
        .add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Initial)
        .unwrap()
        .clone();

    assert!((route.load(&problem) - 5.0).abs() < 1e-9);
    // Travel 15 plus service 2.
    assert!((route.duration(&problem) - 17.0).abs() < 1e-9);

    let arrivals = route.arrival_times(&problem);
    assert_eq!(arrivals[0], (1, 5.0));
    assert_eq!(arrivals[1], (2, 10.0));
    assert_eq!(arrivals[2], (9, 17.0));

    let departures = route.departure_times(&problem);
    assert_eq!(departures[0], (1, 6.0));
    assert_eq!(departures[1], (2, 11.0));

    let loads = route.node_loads(&problem);
    assert_eq!(loads[0], (1, 2.0));
    assert_eq!(loads[1], (2, 5.0));
}

#[test]
fn arrival_times_wait_for_time_windows() {
    let mut problem = line_problem();
    problem.nodes[1] = Node::customer(1, 2.0)
        .with_service_time(1.0)
        .with_time_window(20.0, 40.0);
    problem.nodes[2] = Node::customer(2, 3.0)
        .with_service_time(1.0)
        .with_time_window(0.0, 100.0);
    let problem = problem.with_time_windows();

    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    let route = pool
        .add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Initial)
        .unwrap()
        .clone();

    let arrivals = route.arrival_times(&problem);
    // The vehicle waits at customer 1 until its window opens.
    assert_eq!(arrivals[0], (1, 20.0));
    assert_eq!(arrivals[1], (2, 25.0));
}

#[test]
fn pool_ids_are_unique_and_monotone() {
    let problem = line_problem();
    let working = WorkingGraph::derive(&problem, &[]).unwrap();
    let mut pool = RouteSet::new();
    pool.add_node_list(vec![0, 1, 2, 9], &working, 0, Origin::Initial);
    pool.add_priced(vec![0, 9], 0.0, 0, Origin::Exact);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get(0).unwrap().id, 1);
    assert_eq!(pool.get(1).unwrap().id, 2);
    assert_eq!(pool.last().unwrap().origin, Origin::Exact);
}
