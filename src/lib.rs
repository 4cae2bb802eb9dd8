//! # cg_vrp
//!
//! A column generation (branch-and-price style) solver for the Vehicle
//! Routing Problem family.
//!
//! The solver alternates between a restricted master problem (set covering
//! over the routes generated so far) and a pricing subproblem that searches
//! for routes with negative reduced cost. The pricing strategy is either
//! fixed or chosen adaptively by a hyper-heuristic that scores strategies
//! on observed quality, runtime and success rate.
//!
//! Resource constraints supported per vehicle type: load capacity, route
//! duration, stop count and node time windows, over a mixed fleet with
//! optional fixed costs, fleet-size bounds and customer drop penalties.

pub mod config;
pub mod hyper;
pub mod initial;
pub mod master;
pub mod pricing;
pub mod problem;
pub mod report;
pub mod route;
pub mod solver;
pub mod utils;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{PricingMode, SolverConfig};
use crate::hyper::{HyperHeuristic, PerformanceMeasure};
use crate::initial::{build_initial_routes, check_initial_routes};
use crate::master::{Duals, MasterProblem, SolverError};
use crate::pricing::{PricedPath, PricingOracle, StrategyKind};
use crate::problem::{Problem, ProblemError, WorkingGraph};
use crate::report::{IterationRecord, RunLog, RunStatistics};
use crate::route::{Origin, Route, RouteSet};
use crate::solver::SimplexSolver;

/// Consecutive non-improving iterations after which the loop gives up.
pub const NO_IMPROVEMENT_LIMIT: u32 = 1000;

/// Iterations without improvement before the adaptive mode forces `Exact`.
const DO_EXACT_DEFAULT: u32 = 1000;

/// The same forcing interval once quality is measured as relative
/// improvement; a tuning heuristic, not a hard rule.
const DO_EXACT_RELATIVE: u32 = 30;

/// Two relaxed objectives closer than this count as unchanged.
const OBJECTIVE_TOLERANCE: f64 = 1e-10;

/// Floor, in seconds, granted to the final integer re-solve.
const MIP_MIN_TIME: f64 = 5.0;

/// Phase of the column generation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Iterating,
    Diving,
    Converged,
    TimedOut,
    MaxIterReached,
}

/// Errors aborting a solve.
#[derive(Debug)]
pub enum SolveError {
    Problem(ProblemError),
    Solver(SolverError),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Problem(e) => write!(f, "{}", e),
            SolveError::Solver(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<ProblemError> for SolveError {
    fn from(e: ProblemError) -> Self {
        SolveError::Problem(e)
    }
}

impl From<SolverError> for SolveError {
    fn from(e: SolverError) -> Self {
        SolveError::Solver(e)
    }
}

/// Wall-clock budget of a run.
///
/// `remaining` hitting exactly `0.0` is the sentinel for "stop now"; with
/// no limit configured it stays `None` forever.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub start: Instant,
    pub limit: Option<f64>,
}

impl Clock {
    pub fn start(limit: Option<f64>) -> Self {
        Clock {
            start: Instant::now(),
            limit,
        }
    }

    /// Seconds left in the budget.
    ///
    /// Integer re-solves are never starved: they are granted at least
    /// [`MIP_MIN_TIME`] seconds regardless of the budget.
    pub fn remaining(&self, mip: bool) -> Option<f64> {
        let limit = self.limit?;
        let remaining = limit - self.start.elapsed().as_secs_f64();
        if mip {
            Some(remaining.max(MIP_MIN_TIME))
        } else if remaining > 0.0 {
            Some(remaining)
        } else {
            Some(0.0)
        }
    }

    fn remaining_duration(&self, mip: bool) -> Option<Duration> {
        self.remaining(mip).map(Duration::from_secs_f64)
    }

    fn expired(&self) -> bool {
        self.remaining(false) == Some(0.0)
    }
}

/// No-improvement counter step: reset when the fresh relaxed objective
/// moved beyond tolerance, increment otherwise.
fn next_no_improvement(counter: u32, last_bound: Option<f64>, relaxed: f64) -> u32 {
    match last_bound {
        Some(last) if (relaxed - last).abs() <= OBJECTIVE_TOLERANCE => counter + 1,
        _ => 0,
    }
}

/// Run one pricing attempt under a fixed strategy, escalating to `Exact`
/// within the same attempt when the strategy's sweep fails.
///
/// Returns the paths, the success flag and whether `Exact` was reached.
fn price_with_escalation(
    oracle: &PricingOracle<'_>,
    duals: &Duals,
    vehicle_type: usize,
    strategy: StrategyKind,
    time_remaining: Option<Duration>,
) -> (Vec<PricedPath>, bool, bool) {
    let (paths, found) = oracle.solve(duals, vehicle_type, strategy, time_remaining);
    if found || strategy == StrategyKind::Exact {
        return (paths, found, strategy == StrategyKind::Exact);
    }
    debug!("{} produced nothing, escalating to Exact", strategy);
    let (paths, found) = oracle.solve(duals, vehicle_type, StrategyKind::Exact, time_remaining);
    (paths, found, true)
}

/// The column generation run state: loop counters, pool, master problem
/// and the adaptive selector.
struct ColumnGeneration<'a> {
    problem: &'a Problem,
    config: &'a SolverConfig,
    working: &'a WorkingGraph,
    pool: RouteSet,
    master: MasterProblem<SimplexSolver>,
    hyper: Option<HyperHeuristic>,
    rng: ChaCha8Rng,
    clock: Clock,
    run_log: Option<RunLog>,
    state: LoopState,
    more_routes: bool,
    produced_column: bool,
    iteration: u64,
    no_improvement: u32,
    lower_bound: Vec<f64>,
    do_exact: u32,
    diving: bool,
}

impl<'a> ColumnGeneration<'a> {
    /// Run master-solve / pricing cycles until a stopping criterion fires.
    fn run(&mut self) -> Result<(), SolveError> {
        while self.more_routes {
            if self.clock.expired() {
                info!("time up!");
                self.state = LoopState::TimedOut;
                return Ok(());
            }
            self.find_columns()?;
            if self.clock.expired() {
                info!("time up!");
                self.state = LoopState::TimedOut;
                return Ok(());
            }
            if self.no_improvement > NO_IMPROVEMENT_LIMIT {
                self.state = LoopState::MaxIterReached;
                return Ok(());
            }
            if let Some(max_iterations) = self.config.max_iterations {
                if self.iteration >= max_iterations {
                    self.state = LoopState::MaxIterReached;
                    return Ok(());
                }
            }
        }
        if self.state != LoopState::Diving {
            self.state = LoopState::Converged;
        }
        Ok(())
    }

    /// One iteration: master solve, strategy choice, pricing per vehicle
    /// type, convergence bookkeeping.
    fn find_columns(&mut self) -> Result<(), SolveError> {
        let time_limit = self.clock.remaining_duration(false);
        let (duals, relaxed_cost) = if self.diving {
            self.master.solve_and_dive(time_limit)?
        } else {
            self.master.solve(true, time_limit)?
        };

        let (active_paths, distribution) = self.master.get_heuristic_distribution(&self.pool);

        let chosen = self.choose_strategy(relaxed_cost, &distribution);
        match chosen {
            Some(strategy) => info!(
                "iteration {}, {:.6}, strategy {}, no improvement {}, active paths {}",
                self.iteration,
                relaxed_cost,
                strategy,
                self.no_improvement,
                active_paths.len()
            ),
            None => info!("iteration {}, {:.6}", self.iteration, relaxed_cost),
        }

        let vehicle_types = self.problem.vehicle_types();
        let mut exact_exhausted = false;
        let mut found_any = false;

        // Duals are the snapshot taken at the top of this iteration; columns
        // added for earlier vehicle types do not refresh them.
        for vehicle_type in 0..vehicle_types {
            if self.config.greedy && !self.problem.time_windows {
                let oracle = PricingOracle::new(self.working, self.problem);
                let greedy_paths = oracle.solve_greedy(&duals, vehicle_type, &mut self.rng);
                for path in &greedy_paths {
                    self.add_column(path, vehicle_type, Origin::Greedy);
                }
                if !greedy_paths.is_empty() {
                    debug!(
                        "greedy pre-pass added {} columns for type {}",
                        greedy_paths.len(),
                        vehicle_type
                    );
                    found_any = true;
                }
            }

            let oracle = PricingOracle::new(self.working, self.problem);
            let time_remaining = self.clock.remaining_duration(false);
            let attempt_start = Instant::now();

            let (paths, produced, exact_attempted) = match chosen {
                // Adaptive mode never escalates inside an iteration; the
                // do_exact forcing covers that ground.
                Some(strategy) => {
                    let (paths, produced) =
                        oracle.solve(&duals, vehicle_type, strategy, time_remaining);
                    (paths, produced, strategy == StrategyKind::Exact)
                }
                None => {
                    let strategy = match self.config.pricing {
                        PricingMode::Fixed(strategy) => strategy,
                        PricingMode::Adaptive => unreachable!("adaptive mode always chooses"),
                    };
                    price_with_escalation(&oracle, &duals, vehicle_type, strategy, time_remaining)
                }
            };

            if let (Some(hyper), Some(strategy)) = (self.hyper.as_mut(), chosen) {
                hyper.record_runtime(strategy, attempt_start.elapsed());
            }

            self.produced_column = produced;
            if produced {
                found_any = true;
                let origin = match chosen {
                    Some(strategy) => strategy.origin(),
                    None if exact_attempted => Origin::Exact,
                    None => match self.config.pricing {
                        PricingMode::Fixed(strategy) => strategy.origin(),
                        PricingMode::Adaptive => unreachable!("adaptive mode always chooses"),
                    },
                };
                let best = paths[0].clone();
                debug!(
                    "new column {:?} with reduced cost {:.6}",
                    best.nodes, best.reduced_cost
                );
                self.add_column(&best, vehicle_type, origin);
            } else {
                debug!("no more routes for vehicle type {}", vehicle_type);
                if exact_attempted {
                    exact_exhausted = true;
                }
            }
        }

        // Only an empty Exact answer certifies that no column exists.
        self.more_routes = found_any || !exact_exhausted;

        self.iteration += 1;
        self.no_improvement = next_no_improvement(
            self.no_improvement,
            self.lower_bound.last().copied(),
            relaxed_cost,
        );
        if !self.diving {
            self.lower_bound.push(relaxed_cost);
        }

        self.write_run_log(relaxed_cost, active_paths.len());
        Ok(())
    }

    /// Strategy for this iteration: `Some` under adaptive control, `None`
    /// when the configured fixed strategy applies.
    fn choose_strategy(
        &mut self,
        relaxed_cost: f64,
        distribution: &master::HeuristicDistribution,
    ) -> Option<StrategyKind> {
        let hyper = self.hyper.as_mut()?;

        if self.no_improvement == self.do_exact {
            self.no_improvement = 0;
            return Some(StrategyKind::Exact);
        }

        if hyper.is_initialisation() {
            if hyper.measure == PerformanceMeasure::RelativeImprovement {
                self.do_exact = DO_EXACT_RELATIVE;
            }
            Some(hyper.initialise(relaxed_cost))
        } else {
            hyper.current_performance(relaxed_cost, self.produced_column, distribution);
            let accepted = hyper.move_acceptance();
            debug!("move accepted: {}", accepted);
            hyper.update_parameters();
            Some(hyper.pick_heuristic())
        }
    }

    fn add_column(&mut self, path: &PricedPath, vehicle_type: usize, origin: Origin) {
        self.pool
            .add_priced(path.nodes.clone(), path.cost, vehicle_type, origin);
        let index = self.pool.len() - 1;
        let route = self.pool.get(index).expect("route just added").clone();
        self.master.update(index, &route);
    }

    fn write_run_log(&mut self, relaxed_cost: f64, total_active: usize) {
        let (log, hyper) = match (&self.run_log, &self.hyper) {
            (Some(log), Some(hyper)) => (log, hyper),
            _ => return,
        };

        let mut record = IterationRecord {
            iteration: self.iteration,
            objective: relaxed_cost,
            average_runtime: hyper.average_runtime(),
            exploration: hyper.last_exploration,
            theta: hyper.theta(),
            no_improvement: self.no_improvement,
            total_active_paths: total_active,
            ..IterationRecord::default()
        };
        for strategy in StrategyKind::ALL {
            let s = hyper.record(strategy);
            let i = strategy.index();
            record.choices[i] = s.uses;
            record.quality[i] = s.quality;
            record.selection_score[i] = s.points;
            record.accepted_columns[i] = s.accepted_columns;
            record.active_paths[i] = s.active_routes;
        }

        if let Err(e) = log.append(&record) {
            warn!("failed to append run log: {}", e);
        }
    }
}

/// The solver: owns the problem definition and configuration, runs column
/// generation on [`solve`](VehicleRoutingProblem::solve) and keeps the
/// results for querying.
pub struct VehicleRoutingProblem {
    pub problem: Problem,
    pub config: SolverConfig,
    state: LoopState,
    iteration: u64,
    lower_bound: Vec<f64>,
    best_value: Option<f64>,
    best_routes: Vec<Route>,
    dropped_nodes: Vec<usize>,
    columns_generated: usize,
    runtime: Duration,
}

impl VehicleRoutingProblem {
    pub fn new(problem: Problem, config: SolverConfig) -> Self {
        VehicleRoutingProblem {
            problem,
            config,
            state: LoopState::Iterating,
            iteration: 0,
            lower_bound: Vec::new(),
            best_value: None,
            best_routes: Vec::new(),
            dropped_nodes: Vec::new(),
            columns_generated: 0,
            runtime: Duration::from_secs(0),
        }
    }

    /// Generate columns until no improving route exists (or a limit
    /// fires), then extract the best integer solution found.
    ///
    /// `initial_routes` seeds the pool; when empty, Clarke & Wright (or
    /// round trips) builds the seed. `preassignments` are locked routes:
    /// complete ones bypass the optimization, partial ones are preserved
    /// as sequences.
    pub fn solve(
        &mut self,
        initial_routes: &[Vec<usize>],
        preassignments: &[Vec<usize>],
    ) -> Result<f64, SolveError> {
        let clock = Clock::start(self.config.time_limit.map(|d| d.as_secs_f64()));
        self.state = LoopState::Iterating;
        self.lower_bound.clear();
        self.best_routes.clear();
        self.dropped_nodes.clear();
        self.best_value = None;
        self.iteration = 0;

        let working = WorkingGraph::derive(&self.problem, preassignments)?;

        // Everything preassigned: nothing to optimize.
        if working.is_trivial() {
            self.state = LoopState::Converged;
            let value = self.append_locked_routes(&working, 0.0);
            self.best_value = Some(value);
            self.runtime = clock.start.elapsed();
            return Ok(value);
        }

        let mut pool = RouteSet::new();
        let seed_routes = if initial_routes.is_empty() {
            build_initial_routes(
                &working,
                self.problem.load_capacity.first().copied(),
                working.num_stops,
                self.problem.duration,
                self.problem.time_windows,
                self.problem.vehicle_types(),
            )
        } else {
            initial_routes.to_vec()
        };
        check_initial_routes(&seed_routes, &working)?;
        for nodes in seed_routes {
            if pool
                .add_node_list(nodes.clone(), &working, 0, Origin::Initial)
                .is_none()
            {
                return Err(SolveError::Problem(ProblemError::BadInitialRoute(format!(
                    "route {:?} uses a pruned arc",
                    nodes
                ))));
            }
        }

        let master = MasterProblem::new(
            &working,
            &pool,
            self.problem.drop_penalty,
            &self.problem.num_vehicles,
            SimplexSolver::new(),
        );

        let hyper = match self.config.pricing {
            PricingMode::Adaptive => Some(HyperHeuristic::new(
                self.config.performance_measure,
                self.config.scaling_factor,
                ChaCha8Rng::seed_from_u64(self.config.seed),
            )),
            PricingMode::Fixed(_) => None,
        };

        let mut generation = ColumnGeneration {
            problem: &self.problem,
            config: &self.config,
            working: &working,
            pool,
            master,
            hyper,
            rng: ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(1)),
            clock,
            run_log: self.config.run_log.as_ref().map(RunLog::new),
            state: LoopState::Iterating,
            more_routes: true,
            produced_column: false,
            iteration: 0,
            no_improvement: 0,
            lower_bound: Vec::new(),
            do_exact: DO_EXACT_DEFAULT,
            diving: false,
        };

        generation.run()?;

        let (objective, routes) = if self.config.dive {
            generation.state = LoopState::Diving;
            generation.diving = true;
            generation.more_routes = true;
            generation.run()?;
            generation
                .master
                .get_total_cost_and_routes(true, &generation.pool, clock.remaining_duration(true))?
        } else {
            generation.master.get_total_cost_and_routes(
                false,
                &generation.pool,
                clock.remaining_duration(true),
            )?
        };

        self.state = generation.state;
        self.iteration = generation.iteration;
        self.lower_bound = generation.lower_bound.clone();
        self.columns_generated = generation.pool.len();
        self.dropped_nodes = generation.master.dropped_nodes.clone();
        self.best_routes = routes;

        let value = self.append_locked_routes(&working, objective);
        self.best_value = Some(value);
        self.runtime = clock.start.elapsed();
        info!(
            "solve finished in state {:?} with value {:.4}",
            self.state, value
        );
        Ok(value)
    }

    /// Fold locked preassigned routes into the final solution, charging
    /// each the cheapest feasible vehicle type.
    fn append_locked_routes(&mut self, working: &WorkingGraph, objective: f64) -> f64 {
        let mut total = objective;
        for nodes in &working.locked_routes {
            let mut best: Option<(usize, f64)> = None;
            for vehicle_type in 0..self.problem.vehicle_types() {
                let cost: Option<f64> = nodes
                    .windows(2)
                    .map(|pair| self.problem.arc_cost(pair[0], pair[1], vehicle_type))
                    .sum::<Option<f64>>()
                    .map(|c| c + self.problem.fixed_cost.get(vehicle_type).copied().unwrap_or(0.0));
                let cost = match cost {
                    Some(cost) => cost,
                    None => continue,
                };
                let load: f64 = nodes
                    .iter()
                    .filter_map(|&v| self.problem.node(v))
                    .map(|n| n.demand)
                    .sum();
                if let Some(&capacity) = self.problem.load_capacity.get(vehicle_type) {
                    if load > capacity + 1e-9 {
                        continue;
                    }
                }
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((vehicle_type, cost));
                }
            }
            if let Some((vehicle_type, cost)) = best {
                let id = self.best_routes.iter().map(|r| r.id).max().unwrap_or(0) + 1;
                self.best_routes.push(Route {
                    id,
                    nodes: nodes.clone(),
                    cost,
                    vehicle_type,
                    origin: Origin::Initial,
                });
                total += cost;
            }
        }
        total
    }

    /// Final state of the column generation loop.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Value of the best solution found.
    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// The selected routes of the best solution.
    pub fn best_routes(&self) -> &[Route] {
        &self.best_routes
    }

    /// Relaxed objective per iteration (the lower bound history).
    pub fn lower_bound(&self) -> &[f64] {
        &self.lower_bound
    }

    /// Customers dropped against the penalty, if any.
    pub fn dropped_nodes(&self) -> &[usize] {
        &self.dropped_nodes
    }

    /// Cost per selected route, keyed by route id.
    pub fn best_routes_cost(&self) -> HashMap<usize, f64> {
        self.best_routes.iter().map(|r| (r.id, r.cost)).collect()
    }

    /// Load per selected route, keyed by route id.
    pub fn best_routes_load(&self) -> HashMap<usize, f64> {
        self.best_routes
            .iter()
            .map(|r| (r.id, r.load(&self.problem)))
            .collect()
    }

    /// Duration per selected route, keyed by route id.
    pub fn best_routes_duration(&self) -> HashMap<usize, f64> {
        self.best_routes
            .iter()
            .map(|r| (r.id, r.duration(&self.problem)))
            .collect()
    }

    /// Arrival times per route and node.
    pub fn arrival_times(&self) -> HashMap<usize, Vec<(usize, f64)>> {
        self.best_routes
            .iter()
            .map(|r| (r.id, r.arrival_times(&self.problem)))
            .collect()
    }

    /// Departure times per route and node.
    pub fn departure_times(&self) -> HashMap<usize, Vec<(usize, f64)>> {
        self.best_routes
            .iter()
            .map(|r| (r.id, r.departure_times(&self.problem)))
            .collect()
    }

    /// Accumulated load per route and node.
    pub fn node_loads(&self) -> HashMap<usize, Vec<(usize, f64)>> {
        self.best_routes
            .iter()
            .map(|r| (r.id, r.node_loads(&self.problem)))
            .collect()
    }

    /// Summary of the last run.
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics {
            iterations: self.iteration,
            runtime: self.runtime,
            best_value: self.best_value.unwrap_or(f64::INFINITY),
            best_route_count: self.best_routes.len(),
            lower_bound: self.lower_bound.last().copied(),
            columns_generated: self.columns_generated,
        }
    }
}
