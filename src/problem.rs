//! Problem definition and the derived working graph.
//!
//! The [`Problem`] is an immutable description of the routing network and
//! fleet. Preprocessing (fixed costs, preassignment locking, infeasible-arc
//! pruning, time-window strengthening, the knapsack stop bound) never touches
//! it; instead [`WorkingGraph::derive`] produces the pruned graph the column
//! generation machinery operates on, so pristine and working data can never
//! alias each other.

use std::collections::HashMap;
use std::fmt;

use log::{info, warn};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::utils::knapsack;

/// Role of a node in the routing network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Source,
    Sink,
    Customer,
}

/// A node of the routing network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub kind: NodeKind,
    pub demand: f64,
    pub service_time: f64,
    /// Earliest service start.
    pub lower: f64,
    /// Latest service start.
    pub upper: f64,
}

impl Node {
    /// Create the source node (the depot exit).
    pub fn source(id: usize) -> Self {
        Node {
            id,
            kind: NodeKind::Source,
            demand: 0.0,
            service_time: 0.0,
            lower: 0.0,
            upper: 0.0,
        }
    }

    /// Create the sink node (the depot entry).
    pub fn sink(id: usize) -> Self {
        Node {
            id,
            kind: NodeKind::Sink,
            demand: 0.0,
            service_time: 0.0,
            lower: 0.0,
            upper: 0.0,
        }
    }

    /// Create a customer node with the given demand.
    pub fn customer(id: usize, demand: f64) -> Self {
        Node {
            id,
            kind: NodeKind::Customer,
            demand,
            service_time: 0.0,
            lower: 0.0,
            upper: 0.0,
        }
    }

    /// Set the service time.
    pub fn with_service_time(mut self, service_time: f64) -> Self {
        self.service_time = service_time;
        self
    }

    /// Set the time window.
    pub fn with_time_window(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }
}

/// A directed arc with one cost per vehicle type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub from: usize,
    pub to: usize,
    pub costs: Vec<f64>,
    pub time: f64,
}

impl Arc {
    /// Create an arc with a single cost, broadcast to every vehicle type.
    pub fn new(from: usize, to: usize, cost: f64) -> Self {
        Arc {
            from,
            to,
            costs: vec![cost],
            time: 0.0,
        }
    }

    /// Create an arc with one cost per vehicle type.
    pub fn with_costs(from: usize, to: usize, costs: Vec<f64>) -> Self {
        Arc {
            from,
            to,
            costs,
            time: 0.0,
        }
    }

    /// Set the travel time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }
}

/// Errors raised while validating a problem definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemError {
    MissingSource,
    MissingSink,
    SourceHasIncomingArcs,
    SinkHasOutgoingArcs,
    UnknownNode(usize),
    CostDimension {
        from: usize,
        to: usize,
        expected: usize,
        found: usize,
    },
    NonPositiveParameter(&'static str),
    FleetDimensionMismatch(&'static str, &'static str),
    BadInitialRoute(String),
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemError::MissingSource => write!(f, "problem requires a source node"),
            ProblemError::MissingSink => write!(f, "problem requires a sink node"),
            ProblemError::SourceHasIncomingArcs => {
                write!(f, "the source node must have no incoming arcs")
            }
            ProblemError::SinkHasOutgoingArcs => {
                write!(f, "the sink node must have no outgoing arcs")
            }
            ProblemError::UnknownNode(id) => write!(f, "arc references unknown node {}", id),
            ProblemError::CostDimension {
                from,
                to,
                expected,
                found,
            } => write!(
                f,
                "cost vector of arc ({}, {}) has dimension {}, expected {}",
                from, to, found, expected
            ),
            ProblemError::NonPositiveParameter(name) => {
                write!(f, "{} must be positive", name)
            }
            ProblemError::FleetDimensionMismatch(a, b) => {
                write!(f, "{} and {} must have the same dimension", a, b)
            }
            ProblemError::BadInitialRoute(reason) => {
                write!(f, "invalid initial route: {}", reason)
            }
        }
    }
}

impl std::error::Error for ProblemError {}

/// An immutable VRP instance: network, fleet and side constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub name: String,
    pub nodes: Vec<Node>,
    pub arcs: Vec<Arc>,
    /// Maximum number of stops per route.
    pub num_stops: Option<usize>,
    /// Maximum load per vehicle, one entry per vehicle type. Empty if
    /// capacities are unconstrained.
    pub load_capacity: Vec<f64>,
    /// Maximum route duration.
    pub duration: Option<f64>,
    /// True if node time windows are enforced.
    pub time_windows: bool,
    /// Penalty for dropping a customer; `None` forbids dropping.
    pub drop_penalty: Option<f64>,
    /// Fixed cost per vehicle type, folded into source-outgoing arcs.
    pub fixed_cost: Vec<f64>,
    /// Fleet size per vehicle type. Empty if unbounded.
    pub num_vehicles: Vec<usize>,
}

impl Problem {
    /// Create a problem over the given network with no side constraints.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, arcs: Vec<Arc>) -> Self {
        Problem {
            name: name.into(),
            nodes,
            arcs,
            num_stops: None,
            load_capacity: Vec::new(),
            duration: None,
            time_windows: false,
            drop_penalty: None,
            fixed_cost: Vec::new(),
            num_vehicles: Vec::new(),
        }
    }

    /// Limit the number of stops per route.
    pub fn with_num_stops(mut self, num_stops: usize) -> Self {
        self.num_stops = Some(num_stops);
        self
    }

    /// Set a single-type load capacity.
    pub fn with_load_capacity(mut self, capacity: f64) -> Self {
        self.load_capacity = vec![capacity];
        self
    }

    /// Set per-type load capacities (mixed fleet).
    pub fn with_load_capacities(mut self, capacities: Vec<f64>) -> Self {
        self.load_capacity = capacities;
        self
    }

    /// Limit route duration.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Enforce node time windows.
    pub fn with_time_windows(mut self) -> Self {
        self.time_windows = true;
        self
    }

    /// Allow dropping customers at the given penalty.
    pub fn with_drop_penalty(mut self, penalty: f64) -> Self {
        self.drop_penalty = Some(penalty);
        self
    }

    /// Set per-type fixed vehicle costs.
    pub fn with_fixed_cost(mut self, fixed_cost: Vec<f64>) -> Self {
        self.fixed_cost = fixed_cost;
        self
    }

    /// Bound the fleet size per vehicle type.
    pub fn with_num_vehicles(mut self, num_vehicles: Vec<usize>) -> Self {
        self.num_vehicles = num_vehicles;
        self
    }

    /// Number of vehicle types, derived from the fleet vectors.
    pub fn vehicle_types(&self) -> usize {
        self.load_capacity
            .len()
            .max(self.fixed_cost.len())
            .max(self.num_vehicles.len())
            .max(1)
    }

    /// Look up a node by id.
    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Look up an arc by endpoints.
    pub fn arc(&self, from: usize, to: usize) -> Option<&Arc> {
        self.arcs.iter().find(|arc| arc.from == from && arc.to == to)
    }

    /// Cost of an arc for a vehicle type, broadcast when a single cost is
    /// given for a mixed fleet.
    pub fn arc_cost(&self, from: usize, to: usize, vehicle_type: usize) -> Option<f64> {
        self.arc(from, to).map(|arc| arc_cost(arc, vehicle_type))
    }

    pub fn source_id(&self) -> Option<usize> {
        self.nodes
            .iter()
            .find(|node| node.kind == NodeKind::Source)
            .map(|node| node.id)
    }

    pub fn sink_id(&self) -> Option<usize> {
        self.nodes
            .iter()
            .find(|node| node.kind == NodeKind::Sink)
            .map(|node| node.id)
    }

    /// Validate the definition: source/sink shape, arc endpoints, cost
    /// dimensions and fleet dimension agreement.
    pub fn validate(&self) -> Result<(), ProblemError> {
        let source = self.source_id().ok_or(ProblemError::MissingSource)?;
        let sink = self.sink_id().ok_or(ProblemError::MissingSink)?;

        let types = self.vehicle_types();
        for arc in &self.arcs {
            if self.node(arc.from).is_none() {
                return Err(ProblemError::UnknownNode(arc.from));
            }
            if self.node(arc.to).is_none() {
                return Err(ProblemError::UnknownNode(arc.to));
            }
            if arc.to == source {
                return Err(ProblemError::SourceHasIncomingArcs);
            }
            if arc.from == sink {
                return Err(ProblemError::SinkHasOutgoingArcs);
            }
            if arc.costs.len() != 1 && arc.costs.len() != types {
                return Err(ProblemError::CostDimension {
                    from: arc.from,
                    to: arc.to,
                    expected: types,
                    found: arc.costs.len(),
                });
            }
        }

        for &capacity in &self.load_capacity {
            if capacity <= 0.0 {
                return Err(ProblemError::NonPositiveParameter("load capacity"));
            }
        }
        if let Some(num_stops) = self.num_stops {
            if num_stops == 0 {
                return Err(ProblemError::NonPositiveParameter("num stops"));
            }
        }
        if let Some(duration) = self.duration {
            if duration < 0.0 {
                return Err(ProblemError::NonPositiveParameter("duration"));
            }
        }

        if !self.load_capacity.is_empty()
            && !self.num_vehicles.is_empty()
            && self.load_capacity.len() != self.num_vehicles.len()
        {
            return Err(ProblemError::FleetDimensionMismatch(
                "load_capacity",
                "num_vehicles",
            ));
        }
        if !self.load_capacity.is_empty()
            && !self.fixed_cost.is_empty()
            && self.load_capacity.len() != self.fixed_cost.len()
        {
            return Err(ProblemError::FleetDimensionMismatch(
                "load_capacity",
                "fixed_cost",
            ));
        }
        if !self.num_vehicles.is_empty()
            && !self.fixed_cost.is_empty()
            && self.num_vehicles.len() != self.fixed_cost.len()
        {
            return Err(ProblemError::FleetDimensionMismatch(
                "num_vehicles",
                "fixed_cost",
            ));
        }

        Ok(())
    }
}

/// Per-type cost of an arc, broadcasting a singleton cost vector.
pub fn arc_cost(arc: &Arc, vehicle_type: usize) -> f64 {
    if arc.costs.len() == 1 {
        arc.costs[0]
    } else {
        arc.costs[vehicle_type]
    }
}

/// Node payload of the working graph.
#[derive(Debug, Clone)]
pub struct WorkNode {
    pub id: usize,
    pub kind: NodeKind,
    pub demand: f64,
    pub service_time: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Arc payload of the working graph: one cost per vehicle type.
#[derive(Debug, Clone)]
pub struct WorkArc {
    pub costs: Vec<f64>,
    pub time: f64,
}

/// The pruned, preprocessed graph the solver iterates on.
///
/// Derived once from the immutable [`Problem`]; the derivation is the only
/// place where preprocessing mutates anything.
#[derive(Debug, Clone)]
pub struct WorkingGraph {
    pub graph: DiGraph<WorkNode, WorkArc>,
    pub source: NodeIndex,
    pub sink: NodeIndex,
    /// Effective stop bound after the knapsack tightening.
    pub num_stops: Option<usize>,
    /// Complete preassigned routes locked out of the graph.
    pub locked_routes: Vec<Vec<usize>>,
    index_of: HashMap<usize, NodeIndex>,
}

impl WorkingGraph {
    /// Derive the working graph from a problem definition and optional
    /// preassigned routes.
    pub fn derive(problem: &Problem, preassignments: &[Vec<usize>]) -> Result<Self, ProblemError> {
        problem.validate()?;

        let types = problem.vehicle_types();
        let source_id = problem.source_id().ok_or(ProblemError::MissingSource)?;
        let sink_id = problem.sink_id().ok_or(ProblemError::MissingSink)?;

        let mut graph: DiGraph<WorkNode, WorkArc> = DiGraph::new();
        let mut index_of = HashMap::new();

        for node in &problem.nodes {
            let mut demand = node.demand;
            if node.kind != NodeKind::Customer && demand > 0.0 {
                warn!("demand {} at node {} is ignored", demand, node.id);
                demand = 0.0;
            }
            let index = graph.add_node(WorkNode {
                id: node.id,
                kind: node.kind,
                demand,
                service_time: node.service_time,
                lower: node.lower,
                upper: node.upper,
            });
            index_of.insert(node.id, index);
        }

        for arc in &problem.arcs {
            let mut costs: Vec<f64> = (0..types).map(|k| arc_cost(arc, k)).collect();
            // Fixed vehicle costs are paid once per route, on leaving the source.
            if arc.from == source_id {
                for (k, fixed) in problem.fixed_cost.iter().enumerate() {
                    costs[k] += fixed;
                }
            }
            graph.add_edge(
                index_of[&arc.from],
                index_of[&arc.to],
                WorkArc {
                    costs,
                    time: arc.time,
                },
            );
        }

        let source = index_of[&source_id];
        let sink = index_of[&sink_id];

        // The trivial route keeps the subproblem feasible.
        if graph.find_edge(source, sink).is_none() {
            graph.add_edge(
                source,
                sink,
                WorkArc {
                    costs: vec![0.0; types],
                    time: 0.0,
                },
            );
        }

        let mut working = WorkingGraph {
            graph,
            source,
            sink,
            num_stops: problem.num_stops,
            locked_routes: Vec::new(),
            index_of,
        };

        working.readjust_sink_time_window();
        working.lock_preassignments(preassignments)?;

        let max_capacity = problem
            .load_capacity
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));

        if let Some(max_capacity) = max_capacity {
            working.prune_capacity_arcs(max_capacity);
        }
        if problem.time_windows {
            working.strengthen_time_windows();
            working.prune_time_window_arcs();
        }
        if let Some(max_capacity) = max_capacity {
            working.tighten_num_stops(max_capacity);
        }

        Ok(working)
    }

    /// Node index for a problem node id.
    pub fn index_of(&self, id: usize) -> Option<NodeIndex> {
        self.index_of.get(&id).copied()
    }

    /// Customer node indices in graph order.
    pub fn customers(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&v| self.graph[v].kind == NodeKind::Customer)
            .collect()
    }

    /// True if the graph is down to the trivial source-sink arc.
    pub fn is_trivial(&self) -> bool {
        self.graph.node_count() == 2
    }

    /// Cost of a node-id route for a vehicle type; `None` if an arc is
    /// missing.
    pub fn route_cost(&self, route: &[usize], vehicle_type: usize) -> Option<f64> {
        let mut total = 0.0;
        for pair in route.windows(2) {
            let from = self.index_of(pair[0])?;
            let to = self.index_of(pair[1])?;
            let edge = self.graph.find_edge(from, to)?;
            total += self.graph[edge].costs[vehicle_type];
        }
        Some(total)
    }

    fn readjust_sink_time_window(&mut self) {
        if self.graph[self.sink].upper != 0.0 {
            return;
        }
        let mut latest: f64 = 0.0;
        let mut walker = self
            .graph
            .neighbors_directed(self.sink, petgraph::Direction::Incoming)
            .detach();
        while let Some((edge, node)) = walker.next(&self.graph) {
            let candidate =
                self.graph[node].upper + self.graph[node].service_time + self.graph[edge].time;
            latest = latest.max(candidate);
        }
        self.graph[self.sink].upper = latest;
    }

    /// Lock preassigned routes: complete routes leave the graph, partial
    /// ones keep their sequence by zeroed arc costs.
    fn lock_preassignments(&mut self, preassignments: &[Vec<usize>]) -> Result<(), ProblemError> {
        let source_id = self.graph[self.source].id;
        let sink_id = self.graph[self.sink].id;

        for route in preassignments {
            if route.len() < 2 {
                return Err(ProblemError::BadInitialRoute(
                    "preassigned route needs at least two nodes".into(),
                ));
            }
            let complete = route[0] == source_id && route[route.len() - 1] == sink_id;
            if complete {
                info!("locking route {:?}", route);
                for &id in &route[1..route.len() - 1] {
                    // Node indices shift on removal; look each one up fresh.
                    if let Some(index) =
                        self.graph.node_indices().find(|&v| self.graph[v].id == id)
                    {
                        self.graph.remove_node(index);
                    }
                }
                self.rebuild_index();
                self.locked_routes.push(route.clone());
            } else {
                for pair in route.windows(2) {
                    let from = self
                        .index_of(pair[0])
                        .ok_or(ProblemError::UnknownNode(pair[0]))?;
                    let to = self
                        .index_of(pair[1])
                        .ok_or(ProblemError::UnknownNode(pair[1]))?;
                    if let Some(edge) = self.graph.find_edge(from, to) {
                        for cost in self.graph[edge].costs.iter_mut() {
                            *cost = 0.0;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index_of.clear();
        for v in self.graph.node_indices() {
            self.index_of.insert(self.graph[v].id, v);
            match self.graph[v].kind {
                NodeKind::Source => self.source = v,
                NodeKind::Sink => self.sink = v,
                NodeKind::Customer => {}
            }
        }
    }

    fn prune_capacity_arcs(&mut self, max_capacity: f64) {
        let infeasible: Vec<_> = self
            .graph
            .edge_indices()
            .filter(|&edge| {
                let (from, to) = self.graph.edge_endpoints(edge).expect("edge exists");
                self.graph[from].demand + self.graph[to].demand > max_capacity
            })
            .collect();
        // Descending order keeps the remaining edge indices valid.
        for edge in infeasible.into_iter().rev() {
            self.graph.remove_edge(edge);
        }
    }

    fn strengthen_time_windows(&mut self) {
        let customers = self.customers();
        for v in customers {
            if let Some(edge) = self.graph.find_edge(self.source, v) {
                let earliest = self.graph[self.source].lower + self.graph[edge].time;
                let node = &mut self.graph[v];
                node.lower = node.lower.max(earliest);
            }
            if let Some(edge) = self.graph.find_edge(v, self.sink) {
                let latest = self.graph[self.sink].upper - self.graph[edge].time;
                let node = &mut self.graph[v];
                node.upper = node.upper.min(latest);
            }
        }
    }

    fn prune_time_window_arcs(&mut self) {
        let infeasible: Vec<_> = self
            .graph
            .edge_indices()
            .filter(|&edge| {
                let (from, to) = self.graph.edge_endpoints(edge).expect("edge exists");
                self.graph[from].lower + self.graph[from].service_time + self.graph[edge].time
                    > self.graph[to].upper
            })
            .collect();
        for edge in infeasible.into_iter().rev() {
            self.graph.remove_edge(edge);
        }
    }

    /// Knapsack bound on the number of stops: maximize visits subject to
    /// the largest capacity.
    fn tighten_num_stops(&mut self, max_capacity: f64) {
        let demands: Vec<u64> = self
            .customers()
            .iter()
            .map(|&v| self.graph[v].demand.round() as u64)
            .collect();
        let bound = knapsack(&demands, max_capacity.floor() as u64);
        let tightened = match self.num_stops {
            Some(current) => current.min(bound),
            None => bound,
        };
        self.num_stops = Some(tightened);
        info!("new upper bound: max num stops = {}", tightened);
    }
}
