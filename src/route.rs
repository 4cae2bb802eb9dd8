//! Routes (columns) and the route pool.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::problem::{Problem, WorkingGraph};

/// Where a column came from.
///
/// Every route carries its origin explicitly; routes produced outside the
/// pricing oracle (initial heuristics, the greedy pre-pass, preassignments)
/// are tagged as such instead of being inferred from a missing attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Initial,
    Greedy,
    BestPaths,
    BestEdges1,
    BestEdges2,
    Exact,
}

/// A column: an ordered source-to-sink path with a fixed cost and vehicle
/// type. Immutable once added to the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: usize,
    /// Node ids from source to sink.
    pub nodes: Vec<usize>,
    pub cost: f64,
    pub vehicle_type: usize,
    pub origin: Origin,
}

impl Route {
    /// The customers visited (everything strictly between source and sink).
    pub fn customers(&self) -> &[usize] {
        &self.nodes[1..self.nodes.len() - 1]
    }

    /// The node sequence of the route.
    pub fn node_list(&self) -> &[usize] {
        &self.nodes
    }

    /// Route cost recomputed against the pristine problem.
    pub fn cost_for(&self, problem: &Problem) -> f64 {
        self.nodes
            .iter()
            .tuple_windows()
            .filter_map(|(&i, &j)| problem.arc_cost(i, j, self.vehicle_type))
            .sum()
    }

    /// Total demand picked up along the route.
    pub fn load(&self, problem: &Problem) -> f64 {
        self.nodes
            .iter()
            .filter_map(|&v| problem.node(v))
            .map(|node| node.demand)
            .sum()
    }

    /// Travel plus service time along the route.
    pub fn duration(&self, problem: &Problem) -> f64 {
        let travel: f64 = self
            .nodes
            .iter()
            .tuple_windows()
            .filter_map(|(&i, &j)| problem.arc(i, j))
            .map(|arc| arc.time)
            .sum();
        let service: f64 = self
            .nodes
            .iter()
            .filter_map(|&v| problem.node(v))
            .map(|node| node.service_time)
            .sum();
        travel + service
    }

    /// Arrival time per node after the source, respecting time windows.
    pub fn arrival_times(&self, problem: &Problem) -> Vec<(usize, f64)> {
        let mut arrivals = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut clock = problem
            .node(self.nodes[0])
            .map(|node| node.lower)
            .unwrap_or(0.0);
        for (&tail, &head) in self.nodes.iter().tuple_windows() {
            let service = problem.node(tail).map(|n| n.service_time).unwrap_or(0.0);
            let travel = problem.arc(tail, head).map(|a| a.time).unwrap_or(0.0);
            let window_open = problem.node(head).map(|n| n.lower).unwrap_or(0.0);
            clock = (clock + service + travel).max(window_open);
            arrivals.push((head, clock));
        }
        arrivals
    }

    /// Departure time per customer (arrival plus its service time).
    pub fn departure_times(&self, problem: &Problem) -> Vec<(usize, f64)> {
        self.arrival_times(problem)
            .into_iter()
            .filter(|&(v, _)| Some(v) != problem.sink_id())
            .map(|(v, arrival)| {
                let service = problem.node(v).map(|n| n.service_time).unwrap_or(0.0);
                (v, arrival + service)
            })
            .collect()
    }

    /// Accumulated load at each node after the source.
    pub fn node_loads(&self, problem: &Problem) -> Vec<(usize, f64)> {
        let mut loads = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut amount = 0.0;
        for &v in &self.nodes[1..] {
            amount += problem.node(v).map(|n| n.demand).unwrap_or(0.0);
            loads.push((v, amount));
        }
        loads
    }
}

/// The append-only pool of generated columns.
///
/// Routes are never removed: the master model only grows over a run.
#[derive(Debug, Clone, Default)]
pub struct RouteSet {
    routes: Vec<Route>,
    next_id: usize,
}

impl RouteSet {
    pub fn new() -> Self {
        RouteSet::default()
    }

    /// Build a route from a node-id list, pricing it on the working graph,
    /// and add it to the pool. Returns `None` if an arc is missing.
    pub fn add_node_list(
        &mut self,
        nodes: Vec<usize>,
        working: &WorkingGraph,
        vehicle_type: usize,
        origin: Origin,
    ) -> Option<&Route> {
        let cost = working.route_cost(&nodes, vehicle_type)?;
        Some(self.add_priced(nodes, cost, vehicle_type, origin))
    }

    /// Add a route whose cost is already known.
    pub fn add_priced(
        &mut self,
        nodes: Vec<usize>,
        cost: f64,
        vehicle_type: usize,
        origin: Origin,
    ) -> &Route {
        self.next_id += 1;
        self.routes.push(Route {
            id: self.next_id,
            nodes,
            cost,
            vehicle_type,
            origin,
        });
        self.routes.last().expect("route just pushed")
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Route> {
        self.routes.get(index)
    }

    pub fn last(&self) -> Option<&Route> {
        self.routes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }
}
