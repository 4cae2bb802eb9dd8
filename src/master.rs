//! Restricted master problem: set covering over the route pool.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use log::{debug, info};

use crate::problem::WorkingGraph;
use crate::route::{Origin, Route, RouteSet};
use crate::solver::{LinearSolver, LpModel, RowSense, SolverStatus};

/// Cost of the artificial slack that keeps vehicle-bound rows feasible
/// while the pool is still poor.
const ARTIFICIAL_COST: f64 = 1e6;

/// A variable is considered selected above this value.
const SELECTION_THRESHOLD: f64 = 0.5;

/// Fatal master-problem failures.
///
/// Only the continuous relaxation can fail fatally: without an optimal
/// relaxed basis there are no duals to price against. Integer re-solves
/// degrade gracefully instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    Status(SolverStatus),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Status(status) => {
                write!(f, "master relaxation did not solve to optimality: {}", status)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Dual prices from the latest relaxed solve.
#[derive(Debug, Clone, Default)]
pub struct Duals {
    nodes: HashMap<usize, f64>,
    vehicle_types: Vec<f64>,
}

impl Duals {
    /// Dual of a customer's covering constraint; zero for unknown nodes.
    pub fn node(&self, id: usize) -> f64 {
        self.nodes.get(&id).copied().unwrap_or(0.0)
    }

    /// Set a node dual (used when composing duals by hand, e.g. in tests).
    pub fn set_node(&mut self, id: usize, value: f64) {
        self.nodes.insert(id, value);
    }

    /// Set the per-type vehicle-bound duals.
    pub fn set_vehicle_types(&mut self, duals: Vec<f64>) {
        self.vehicle_types = duals;
    }

    /// Dual of a vehicle-count bound; zero when the fleet is unbounded.
    pub fn vehicle_type(&self, vehicle_type: usize) -> f64 {
        self.vehicle_types.get(vehicle_type).copied().unwrap_or(0.0)
    }
}

/// How many selected routes each pricing origin contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeuristicDistribution {
    pub best_paths: usize,
    pub best_edges1: usize,
    pub best_edges2: usize,
    pub exact: usize,
    pub other: usize,
}

impl HeuristicDistribution {
    fn count(&mut self, origin: Origin) {
        match origin {
            Origin::BestPaths => self.best_paths += 1,
            Origin::BestEdges1 => self.best_edges1 += 1,
            Origin::BestEdges2 => self.best_edges2 += 1,
            Origin::Exact => self.exact += 1,
            Origin::Initial | Origin::Greedy => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.best_paths + self.best_edges1 + self.best_edges2 + self.exact + self.other
    }
}

/// The restricted master problem.
///
/// Columns are only ever added; constraint rows are created once at build
/// time, so `update` preserves every existing binding.
pub struct MasterProblem<S: LinearSolver> {
    solver: S,
    model: LpModel,
    covering_rows: HashMap<usize, usize>,
    vehicle_rows: Vec<usize>,
    /// Route pool index per model variable, in variable order.
    route_vars: Vec<usize>,
    route_var_index: Vec<usize>,
    drop_vars: HashMap<usize, usize>,
    artificial_vars: Vec<usize>,
    drop_penalty: Option<f64>,
    /// Customers dropped in the latest integer extraction.
    pub dropped_nodes: Vec<usize>,
    last_values: Vec<f64>,
}

impl<S: LinearSolver> MasterProblem<S> {
    /// Build the set-covering model over the current pool.
    pub fn new(
        working: &WorkingGraph,
        pool: &RouteSet,
        drop_penalty: Option<f64>,
        num_vehicles: &[usize],
        solver: S,
    ) -> Self {
        let mut model = LpModel::new();
        let mut covering_rows = HashMap::new();

        for &v in &working.customers() {
            let id = working.graph[v].id;
            let row = model.add_row(RowSense::Ge, 1.0);
            covering_rows.insert(id, row);
        }

        let mut vehicle_rows = Vec::new();
        let mut artificial_vars = Vec::new();
        for &bound in num_vehicles {
            let row = model.add_row(RowSense::Le, bound as f64);
            vehicle_rows.push(row);
            // Artificial slack relaxes the bound at a prohibitive cost so
            // the restricted problem is never infeasible.
            let var = model.add_variable(ARTIFICIAL_COST, 0.0, f64::INFINITY, false, &[(row, -1.0)]);
            artificial_vars.push(var);
        }

        let mut drop_vars = HashMap::new();
        if let Some(penalty) = drop_penalty {
            for (&id, &row) in &covering_rows {
                let var = model.add_variable(penalty, 0.0, 1.0, true, &[(row, 1.0)]);
                drop_vars.insert(id, var);
            }
        }

        let mut master = MasterProblem {
            solver,
            model,
            covering_rows,
            vehicle_rows,
            route_vars: Vec::new(),
            route_var_index: Vec::new(),
            drop_vars,
            artificial_vars,
            drop_penalty,
            dropped_nodes: Vec::new(),
            last_values: Vec::new(),
        };

        for (index, route) in pool.iter().enumerate() {
            master.add_column(index, route);
        }

        master
    }

    /// Add exactly one new column for a freshly generated route.
    pub fn update(&mut self, pool_index: usize, route: &Route) {
        self.add_column(pool_index, route);
    }

    fn add_column(&mut self, pool_index: usize, route: &Route) {
        let mut column: Vec<(usize, f64)> = Vec::new();
        for &customer in route.customers() {
            if let Some(&row) = self.covering_rows.get(&customer) {
                column.push((row, 1.0));
            }
        }
        if let Some(&row) = self.vehicle_rows.get(route.vehicle_type) {
            column.push((row, 1.0));
        }
        let var = self.model.add_variable(route.cost, 0.0, 1.0, true, &column);
        self.route_vars.push(pool_index);
        self.route_var_index.push(var);
    }

    /// Solve the model.
    ///
    /// The relaxed solve must be optimal (its duals feed the pricing
    /// oracle); anything else is a [`SolverError`]. The integer solve
    /// accepts a time-limited incumbent as a degraded result.
    pub fn solve(
        &mut self,
        relax: bool,
        time_limit: Option<Duration>,
    ) -> Result<(Duals, f64), SolverError> {
        if relax {
            let solution = self.solver.solve_lp(&self.model, time_limit);
            debug!("master relaxation status {}", solution.status);
            if solution.status != SolverStatus::Optimal {
                return Err(SolverError::Status(solution.status));
            }
            self.last_values = solution.values.clone();
            let duals = self.extract_duals(&solution.duals);
            Ok((duals, solution.objective))
        } else {
            // Integer mode: the artificial bound slack must not mask an
            // exhausted fleet.
            let saved: Vec<f64> = self
                .artificial_vars
                .iter()
                .map(|&var| self.model.upper_bounds[var])
                .collect();
            for &var in &self.artificial_vars {
                self.model.upper_bounds[var] = 0.0;
            }
            let solution = self.solver.solve_ip(&self.model, time_limit);
            for (&var, &bound) in self.artificial_vars.iter().zip(saved.iter()) {
                self.model.upper_bounds[var] = bound;
            }
            debug!("master integer status {}", solution.status);
            if !solution.values.is_empty() {
                self.last_values = solution.values;
            }
            Ok((Duals::default(), solution.objective))
        }
    }

    /// Relaxed solve followed by a dive: near-integral route variables are
    /// fixed to one and the relaxation resolved until it is integral.
    pub fn solve_and_dive(
        &mut self,
        time_limit: Option<Duration>,
    ) -> Result<(Duals, f64), SolverError> {
        let (mut duals, mut objective) = self.solve(true, time_limit)?;

        loop {
            let candidate = self
                .route_var_index
                .iter()
                .map(|&var| (var, self.last_values.get(var).copied().unwrap_or(0.0)))
                .filter(|&(_, value)| value > 1e-6 && value < 1.0 - 1e-6)
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let (var, value) = match candidate {
                Some(found) => found,
                None => break,
            };
            debug!("diving: fixing variable {} at value {:.4}", var, value);
            self.model.lower_bounds[var] = 1.0;

            let (next_duals, next_objective) = self.solve(true, time_limit)?;
            duals = next_duals;
            objective = next_objective;
        }

        Ok((duals, objective))
    }

    /// Re-solve with the requested variable types and extract the selected
    /// routes (value above 0.5) together with the total cost.
    pub fn get_total_cost_and_routes(
        &mut self,
        relax: bool,
        pool: &RouteSet,
        time_limit: Option<Duration>,
    ) -> Result<(f64, Vec<Route>), SolverError> {
        let (_, objective) = self.solve(relax, time_limit)?;

        let mut selected = Vec::new();
        for (&pool_index, &var) in self.route_vars.iter().zip(self.route_var_index.iter()) {
            let value = self.last_values.get(var).copied().unwrap_or(0.0);
            if value > SELECTION_THRESHOLD {
                if let Some(route) = pool.get(pool_index) {
                    debug!(
                        "route {:?} cost {} selected at {:.4}",
                        route.node_list(),
                        route.cost,
                        value
                    );
                    selected.push(route.clone());
                }
            }
        }

        if self.drop_penalty.is_some() {
            self.dropped_nodes = self
                .drop_vars
                .iter()
                .filter(|(_, &var)| self.last_values.get(var).copied().unwrap_or(0.0) > SELECTION_THRESHOLD)
                .map(|(&id, _)| id)
                .collect();
            if !relax && !self.dropped_nodes.is_empty() {
                info!("dropped nodes: {:?}", self.dropped_nodes);
            }
        }

        let objective = if objective.is_finite() { objective } else { 0.0 };
        info!("total cost = {}", objective);
        Ok((objective, selected))
    }

    /// Selected routes of the latest solve, bucketed by producing strategy.
    pub fn get_heuristic_distribution(&self, pool: &RouteSet) -> (Vec<Route>, HeuristicDistribution) {
        let mut distribution = HeuristicDistribution::default();
        let mut active = Vec::new();
        for (&pool_index, &var) in self.route_vars.iter().zip(self.route_var_index.iter()) {
            let value = self.last_values.get(var).copied().unwrap_or(0.0);
            if value > SELECTION_THRESHOLD {
                if let Some(route) = pool.get(pool_index) {
                    distribution.count(route.origin);
                    active.push(route.clone());
                }
            }
        }
        (active, distribution)
    }

    fn extract_duals(&self, row_duals: &[f64]) -> Duals {
        let mut nodes = HashMap::new();
        for (&id, &row) in &self.covering_rows {
            nodes.insert(id, row_duals.get(row).copied().unwrap_or(0.0));
        }
        let vehicle_types = self
            .vehicle_rows
            .iter()
            .map(|&row| row_duals.get(row).copied().unwrap_or(0.0))
            .collect();
        Duals {
            nodes,
            vehicle_types,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.route_vars.len()
    }
}
