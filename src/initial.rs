//! Initial feasible route sets.
//!
//! Clarke & Wright savings (with a sweep over the route-shape parameter)
//! plus a greedy sequential construction seed the pool when the instance
//! allows it; otherwise one round trip per customer does. Initial routes
//! are always built for vehicle type 0.

use log::info;
use petgraph::graph::NodeIndex;

use crate::problem::{ProblemError, WorkingGraph};

/// Route-shape parameters swept when seeding with Clarke & Wright.
pub fn alpha_sweep() -> impl Iterator<Item = f64> {
    (1..20).map(|x| x as f64 / 10.0)
}

/// The Clarke & Wright savings construction for one `alpha`.
pub struct ClarkeWright {
    pub alpha: f64,
    pub capacity: Option<f64>,
    pub duration: Option<f64>,
    pub num_stops: Option<usize>,
}

/// Routes produced by a construction together with their total cost.
#[derive(Debug, Clone)]
pub struct Construction {
    pub routes: Vec<Vec<usize>>,
    pub value: f64,
}

impl ClarkeWright {
    pub fn new(alpha: f64) -> Self {
        ClarkeWright {
            alpha,
            capacity: None,
            duration: None,
            num_stops: None,
        }
    }

    pub fn with_capacity(mut self, capacity: Option<f64>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_num_stops(mut self, num_stops: Option<usize>) -> Self {
        self.num_stops = num_stops;
        self
    }

    /// Run the savings merge procedure on the working graph.
    pub fn run(&self, working: &WorkingGraph) -> Construction {
        let source = working.source;
        let sink = working.sink;

        // One route per customer that can do a round trip.
        let mut routes: Vec<Vec<NodeIndex>> = Vec::new();
        let mut route_of: Vec<Option<usize>> = vec![None; working.graph.node_count()];
        for &v in &working.customers() {
            if working.graph.find_edge(source, v).is_some()
                && working.graph.find_edge(v, sink).is_some()
            {
                route_of[v.index()] = Some(routes.len());
                routes.push(vec![v]);
            }
        }

        // Savings for merging "... -> i -> sink" with "source -> j -> ...".
        let mut savings: Vec<(f64, NodeIndex, NodeIndex)> = Vec::new();
        for &i in &working.customers() {
            for &j in &working.customers() {
                if i == j {
                    continue;
                }
                let (to_sink, from_source, between) = match (
                    self.cost(working, i, sink),
                    self.cost(working, source, j),
                    self.cost(working, i, j),
                ) {
                    (Some(a), Some(b), Some(c)) => (a, b, c),
                    _ => continue,
                };
                let saving = to_sink + from_source - self.alpha * between;
                if saving > 0.0 {
                    savings.push((saving, i, j));
                }
            }
        }
        savings.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for &(_, i, j) in &savings {
            let (route_i, route_j) = match (route_of[i.index()], route_of[j.index()]) {
                (Some(a), Some(b)) if a != b => (a, b),
                _ => continue,
            };
            // i must end its route, j must start its own.
            if routes[route_i].last() != Some(&i) || routes[route_j].first() != Some(&j) {
                continue;
            }

            let merged: Vec<NodeIndex> = routes[route_i]
                .iter()
                .chain(routes[route_j].iter())
                .copied()
                .collect();
            if !self.is_feasible(working, &merged) {
                continue;
            }

            for &v in &routes[route_j].clone() {
                route_of[v.index()] = Some(route_i);
            }
            routes[route_i] = merged;
            routes[route_j].clear();
        }

        let routes: Vec<Vec<usize>> = routes
            .into_iter()
            .filter(|route| !route.is_empty())
            .map(|route| {
                let mut ids = vec![working.graph[source].id];
                ids.extend(route.iter().map(|&v| working.graph[v].id));
                ids.push(working.graph[sink].id);
                ids
            })
            .collect();

        let value = routes
            .iter()
            .filter_map(|route| working.route_cost(route, 0))
            .sum();

        Construction { routes, value }
    }

    fn cost(&self, working: &WorkingGraph, from: NodeIndex, to: NodeIndex) -> Option<f64> {
        working
            .graph
            .find_edge(from, to)
            .map(|edge| working.graph[edge].costs[0])
    }

    fn is_feasible(&self, working: &WorkingGraph, customers: &[NodeIndex]) -> bool {
        if let Some(num_stops) = self.num_stops {
            if customers.len() > num_stops {
                return false;
            }
        }
        if let Some(capacity) = self.capacity {
            let load: f64 = customers.iter().map(|&v| working.graph[v].demand).sum();
            if load > capacity + 1e-9 {
                return false;
            }
        }
        if let Some(duration) = self.duration {
            let mut time = 0.0;
            let mut previous = working.source;
            for &v in customers {
                match self.cost_time(working, previous, v) {
                    Some(t) => time += t + working.graph[v].service_time,
                    None => return false,
                }
                previous = v;
            }
            match self.cost_time(working, previous, working.sink) {
                Some(t) => time += t,
                None => return false,
            }
            if time > duration + 1e-9 {
                return false;
            }
        }
        true
    }

    fn cost_time(&self, working: &WorkingGraph, from: NodeIndex, to: NodeIndex) -> Option<f64> {
        working
            .graph
            .find_edge(from, to)
            .map(|edge| working.graph[edge].time)
    }
}

/// Greedy sequential construction: repeatedly extend towards the nearest
/// feasible unvisited customer, closing the route when none remains.
pub fn greedy_construction(
    working: &WorkingGraph,
    capacity: Option<f64>,
    num_stops: Option<usize>,
    duration: Option<f64>,
) -> Construction {
    let source = working.source;
    let sink = working.sink;
    let mut unvisited: Vec<NodeIndex> = working
        .customers()
        .into_iter()
        .filter(|&v| {
            // Must be reachable and able to return.
            working.graph.find_edge(v, sink).is_some()
        })
        .collect();
    let mut routes = Vec::new();

    while !unvisited.is_empty() {
        let mut route = vec![source];
        let mut load = 0.0;
        let mut time = 0.0;
        let mut stops = 0;
        let mut current = source;

        loop {
            let mut best: Option<(NodeIndex, f64)> = None;
            for &v in &unvisited {
                let edge = match working.graph.find_edge(current, v) {
                    Some(edge) => edge,
                    None => continue,
                };
                // The route must always be able to close at the sink.
                if working.graph.find_edge(v, sink).is_none() {
                    continue;
                }
                let cost = working.graph[edge].costs[0];
                if let Some(capacity) = capacity {
                    if load + working.graph[v].demand > capacity + 1e-9 {
                        continue;
                    }
                }
                if let Some(num_stops) = num_stops {
                    if stops + 1 > num_stops {
                        continue;
                    }
                }
                if let Some(duration) = duration {
                    let travel = working.graph[edge].time + working.graph[v].service_time;
                    let back = working
                        .graph
                        .find_edge(v, sink)
                        .map(|e| working.graph[e].time)
                        .unwrap_or(0.0);
                    if time + travel + back > duration + 1e-9 {
                        continue;
                    }
                }
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((v, cost));
                }
            }

            match best {
                Some((v, _)) => {
                    let edge = working.graph.find_edge(current, v).expect("checked above");
                    time += working.graph[edge].time + working.graph[v].service_time;
                    load += working.graph[v].demand;
                    stops += 1;
                    route.push(v);
                    unvisited.retain(|&u| u != v);
                    current = v;
                }
                None => break,
            }
        }

        if route.len() == 1 {
            // No customer could be added at all; stop rather than loop.
            break;
        }
        route.push(sink);
        routes.push(route);
    }

    let routes: Vec<Vec<usize>> = routes
        .into_iter()
        .map(|route| route.into_iter().map(|v| working.graph[v].id).collect())
        .collect();
    let value = routes
        .iter()
        .filter_map(|route| working.route_cost(route, 0))
        .sum();

    Construction { routes, value }
}

/// One round trip per customer, for instances Clarke & Wright cannot seed.
pub fn round_trips(working: &WorkingGraph) -> Vec<Vec<usize>> {
    let source = working.source;
    let sink = working.sink;
    working
        .customers()
        .into_iter()
        .filter(|&v| {
            working.graph.find_edge(source, v).is_some()
                && working.graph.find_edge(v, sink).is_some()
        })
        .map(|v| {
            vec![
                working.graph[source].id,
                working.graph[v].id,
                working.graph[sink].id,
            ]
        })
        .collect()
}

/// Seed the pool: Clarke & Wright over the alpha sweep plus the greedy
/// construction when the instance shape allows, round trips otherwise.
pub fn build_initial_routes(
    working: &WorkingGraph,
    capacity: Option<f64>,
    num_stops: Option<usize>,
    duration: Option<f64>,
    time_windows: bool,
    vehicle_types: usize,
) -> Vec<Vec<usize>> {
    if !time_windows && vehicle_types == 1 {
        let mut routes = Vec::new();
        let mut best_value = f64::INFINITY;
        let mut best_fleet = 0;
        for alpha in alpha_sweep() {
            let construction = ClarkeWright::new(alpha)
                .with_capacity(capacity)
                .with_duration(duration)
                .with_num_stops(num_stops)
                .run(working);
            if construction.value < best_value && !construction.routes.is_empty() {
                best_value = construction.value;
                best_fleet = construction.routes.len();
            }
            routes.extend(construction.routes);
        }
        info!(
            "Clarke & Wright solution found with value {} and {} vehicles",
            best_value, best_fleet
        );

        let greedy = greedy_construction(working, capacity, num_stops, duration);
        info!(
            "Greedy solution found with value {} and {} vehicles",
            greedy.value,
            greedy.routes.len()
        );
        routes.extend(greedy.routes);
        routes
    } else {
        round_trips(working)
    }
}

/// Validate user-supplied initial routes: source-to-sink paths over
/// existing arcs, covering every customer.
pub fn check_initial_routes(
    routes: &[Vec<usize>],
    working: &WorkingGraph,
) -> Result<(), ProblemError> {
    let source_id = working.graph[working.source].id;
    let sink_id = working.graph[working.sink].id;

    let mut covered: Vec<usize> = Vec::new();
    for route in routes {
        if route.len() < 2 || route[0] != source_id || route[route.len() - 1] != sink_id {
            return Err(ProblemError::BadInitialRoute(format!(
                "route {:?} must run from source to sink",
                route
            )));
        }
        for pair in route.windows(2) {
            let from = working
                .index_of(pair[0])
                .ok_or(ProblemError::UnknownNode(pair[0]))?;
            let to = working
                .index_of(pair[1])
                .ok_or(ProblemError::UnknownNode(pair[1]))?;
            if working.graph.find_edge(from, to).is_none() {
                return Err(ProblemError::BadInitialRoute(format!(
                    "missing arc ({}, {})",
                    pair[0], pair[1]
                )));
            }
        }
        covered.extend(&route[1..route.len() - 1]);
    }

    for &v in &working.customers() {
        let id = working.graph[v].id;
        if !covered.contains(&id) {
            return Err(ProblemError::BadInitialRoute(format!(
                "customer {} is not covered",
                id
            )));
        }
    }

    Ok(())
}
