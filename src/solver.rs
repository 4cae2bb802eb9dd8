//! Linear programming backend boundary.
//!
//! The master problem talks to an abstract [`LinearSolver`] so that an
//! external MIP/LP engine can be plugged in. The crate ships with a dense
//! Big-M simplex and a depth-first branch-and-bound on top of it, which is
//! enough to solve the restricted master problems of small and medium
//! instances without any system dependencies.

use std::fmt;
use std::time::{Duration, Instant};

use log::debug;

const EPS: f64 = 1e-9;
const BIG_M: f64 = 1e8;

/// Status reported by a backend after a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimedOut,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverStatus::Optimal => "Optimal",
            SolverStatus::Infeasible => "Infeasible",
            SolverStatus::Unbounded => "Unbounded",
            SolverStatus::TimedOut => "TimedOut",
        };
        write!(f, "{}", name)
    }
}

/// Direction of a linear constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

/// A linear constraint with sparse coefficients.
#[derive(Debug, Clone)]
pub struct Row {
    pub coefficients: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

/// A linear program in minimization form.
///
/// Variables are added incrementally together with their column (their
/// coefficients in existing rows); rows never change once added except for
/// receiving coefficients of newly added variables. This mirrors the
/// incremental column addition the column generation loop relies on.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
    pub objective: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub integer: Vec<bool>,
    pub rows: Vec<Row>,
}

impl LpModel {
    pub fn new() -> Self {
        LpModel::default()
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Add an empty constraint row and return its index.
    pub fn add_row(&mut self, sense: RowSense, rhs: f64) -> usize {
        self.rows.push(Row {
            coefficients: Vec::new(),
            sense,
            rhs,
        });
        self.rows.len() - 1
    }

    /// Add a variable with its objective cost, bounds and column.
    ///
    /// The column lists `(row_index, coefficient)` pairs for rows the
    /// variable participates in. Returns the variable index.
    pub fn add_variable(
        &mut self,
        objective: f64,
        lower: f64,
        upper: f64,
        integer: bool,
        column: &[(usize, f64)],
    ) -> usize {
        let index = self.objective.len();
        self.objective.push(objective);
        self.lower_bounds.push(lower);
        self.upper_bounds.push(upper);
        self.integer.push(integer);
        for &(row, coefficient) in column {
            self.rows[row].coefficients.push((index, coefficient));
        }
        index
    }
}

/// Result of a backend solve.
#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: SolverStatus,
    pub objective: f64,
    /// Primal value per variable; empty if no solution is available.
    pub values: Vec<f64>,
    /// Dual price per model row; only populated by relaxed solves.
    pub duals: Vec<f64>,
}

impl LpSolution {
    fn without_solution(status: SolverStatus) -> Self {
        LpSolution {
            status,
            objective: f64::INFINITY,
            values: Vec::new(),
            duals: Vec::new(),
        }
    }
}

/// Backend boundary: anything that can solve the master problem's models.
pub trait LinearSolver {
    /// Solve the continuous relaxation (integrality requirements ignored).
    fn solve_lp(&self, model: &LpModel, time_limit: Option<Duration>) -> LpSolution;

    /// Solve with integrality requirements enforced.
    fn solve_ip(&self, model: &LpModel, time_limit: Option<Duration>) -> LpSolution;
}

/// Built-in backend: dense Big-M simplex plus branch-and-bound.
#[derive(Debug, Clone)]
pub struct SimplexSolver {
    /// Hard cap on simplex pivots per LP solve.
    pub max_pivots: usize,
    /// Hard cap on branch-and-bound nodes per IP solve.
    pub max_nodes: usize,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        SimplexSolver {
            max_pivots: 50_000,
            max_nodes: 100_000,
        }
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        SimplexSolver::default()
    }
}

impl LinearSolver for SimplexSolver {
    fn solve_lp(&self, model: &LpModel, time_limit: Option<Duration>) -> LpSolution {
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        solve_relaxation(model, &model.lower_bounds, &model.upper_bounds, deadline, self.max_pivots)
    }

    fn solve_ip(&self, model: &LpModel, time_limit: Option<Duration>) -> LpSolution {
        let deadline = time_limit.map(|limit| Instant::now() + limit);
        branch_and_bound(model, deadline, self)
    }
}

/// Solve the relaxation of `model` with the given bound vectors.
///
/// Lower bounds are handled by the substitution `x = x' + lb`; finite upper
/// bounds become explicit rows. Duals are reported for the model's own rows
/// only.
fn solve_relaxation(
    model: &LpModel,
    lower: &[f64],
    upper: &[f64],
    deadline: Option<Instant>,
    max_pivots: usize,
) -> LpSolution {
    let n = model.num_variables();
    let m_model = model.num_rows();

    // Dense rows for the model constraints, with lower-bound substitution
    // folded into the right-hand side.
    let mut dense_rows: Vec<Vec<f64>> = Vec::with_capacity(m_model);
    let mut senses: Vec<RowSense> = Vec::with_capacity(m_model);
    let mut rhs: Vec<f64> = Vec::with_capacity(m_model);
    let mut objective_shift = 0.0;

    for j in 0..n {
        objective_shift += model.objective[j] * lower[j];
    }

    for row in &model.rows {
        let mut coefficients = vec![0.0; n];
        let mut b = row.rhs;
        for &(j, a) in &row.coefficients {
            coefficients[j] += a;
            b -= a * lower[j];
        }
        dense_rows.push(coefficients);
        senses.push(row.sense);
        rhs.push(b);
    }

    // Finite upper bounds as extra rows: x' <= ub - lb.
    for j in 0..n {
        if upper[j].is_finite() {
            let span = upper[j] - lower[j];
            if span < -EPS {
                return LpSolution::without_solution(SolverStatus::Infeasible);
            }
            let mut coefficients = vec![0.0; n];
            coefficients[j] = 1.0;
            dense_rows.push(coefficients);
            senses.push(RowSense::Le);
            rhs.push(span.max(0.0));
        }
    }

    let m = dense_rows.len();

    // Normalize to b >= 0, remembering sign flips for dual recovery.
    let mut flipped = vec![false; m];
    for i in 0..m {
        if rhs[i] < 0.0 {
            for value in dense_rows[i].iter_mut() {
                *value = -*value;
            }
            rhs[i] = -rhs[i];
            senses[i] = match senses[i] {
                RowSense::Le => RowSense::Ge,
                RowSense::Ge => RowSense::Le,
                RowSense::Eq => RowSense::Eq,
            };
            flipped[i] = true;
        }
    }

    // Tableau layout: structural | slack/surplus | artificial | rhs.
    let mut slack_count = 0;
    for sense in &senses {
        if *sense != RowSense::Eq {
            slack_count += 1;
        }
    }
    let mut artificial_count = 0;
    for sense in &senses {
        if *sense != RowSense::Le {
            artificial_count += 1;
        }
    }

    let total = n + slack_count + artificial_count;
    let mut tableau = vec![vec![0.0; total + 1]; m];
    let mut cost = vec![0.0; total];
    let mut basis = vec![0usize; m];
    // Column whose initial unit vector identifies row i, for dual recovery.
    let mut identity_column = vec![0usize; m];

    for j in 0..n {
        cost[j] = model.objective[j];
    }

    let mut slack_index = n;
    let mut artificial_index = n + slack_count;
    for i in 0..m {
        for j in 0..n {
            tableau[i][j] = dense_rows[i][j];
        }
        tableau[i][total] = rhs[i];
        match senses[i] {
            RowSense::Le => {
                tableau[i][slack_index] = 1.0;
                basis[i] = slack_index;
                identity_column[i] = slack_index;
                slack_index += 1;
            }
            RowSense::Ge => {
                tableau[i][slack_index] = -1.0;
                slack_index += 1;
                tableau[i][artificial_index] = 1.0;
                cost[artificial_index] = BIG_M;
                basis[i] = artificial_index;
                identity_column[i] = artificial_index;
                artificial_index += 1;
            }
            RowSense::Eq => {
                tableau[i][artificial_index] = 1.0;
                cost[artificial_index] = BIG_M;
                basis[i] = artificial_index;
                identity_column[i] = artificial_index;
                artificial_index += 1;
            }
        }
    }

    // Simplex iterations with Bland's rule.
    let mut pivots = 0;
    loop {
        if pivots >= max_pivots {
            debug!("simplex pivot cap reached after {} pivots", pivots);
            return LpSolution::without_solution(SolverStatus::TimedOut);
        }
        if let Some(deadline) = deadline {
            if pivots % 64 == 0 && Instant::now() >= deadline {
                return LpSolution::without_solution(SolverStatus::TimedOut);
            }
        }

        // Reduced costs r_j = c_j - c_B * T[:, j]; entering = first negative
        // index (Bland's rule, no cycling).
        let mut entering = None;
        for j in 0..total {
            if model_is_basic(&basis, j) {
                continue;
            }
            let mut z = 0.0;
            for i in 0..m {
                z += cost[basis[i]] * tableau[i][j];
            }
            if cost[j] - z < -1e-7 {
                entering = Some(j);
                break;
            }
        }

        let entering = match entering {
            Some(j) => j,
            None => break,
        };

        // Ratio test. Ties prefer kicking artificials out of the basis
        // (their Big-M cost must not leak into the duals), then the
        // smallest basis index.
        let first_artificial = n + slack_count;
        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            if tableau[i][entering] > EPS {
                let ratio = tableau[i][total] / tableau[i][entering];
                let preferred = match leaving {
                    None => true,
                    Some(l) => {
                        ratio < best_ratio - EPS
                            || (ratio < best_ratio + EPS
                                && match (
                                    basis[i] >= first_artificial,
                                    basis[l] >= first_artificial,
                                ) {
                                    (true, false) => true,
                                    (false, true) => false,
                                    _ => basis[i] < basis[l],
                                })
                    }
                };
                if preferred {
                    best_ratio = ratio;
                    leaving = Some(i);
                }
            }
        }

        let leaving = match leaving {
            Some(i) => i,
            None => return LpSolution::without_solution(SolverStatus::Unbounded),
        };

        pivot(&mut tableau, &mut basis, leaving, entering, total, m);
        pivots += 1;
    }

    // An artificial variable left in the basis at positive level means the
    // constraints cannot be satisfied.
    let first_artificial = n + slack_count;
    for i in 0..m {
        if basis[i] >= first_artificial && tableau[i][total] > 1e-6 {
            return LpSolution::without_solution(SolverStatus::Infeasible);
        }
    }

    let mut values = lower.to_vec();
    for i in 0..m {
        if basis[i] < n {
            values[basis[i]] = lower[basis[i]] + tableau[i][total];
        }
    }

    let mut objective = objective_shift;
    for j in 0..n {
        objective += model.objective[j] * (values[j] - lower[j]);
    }

    // Duals: y_i = c_B * B^{-1} e_i, read from the column whose initial
    // content was the unit vector of row i; flipped rows flip the sign.
    // An artificial stuck in a redundant row counts with cost zero.
    let mut duals = vec![0.0; m_model];
    for i in 0..m_model {
        let column = identity_column[i];
        let mut y = 0.0;
        for k in 0..m {
            if basis[k] >= first_artificial {
                continue;
            }
            y += cost[basis[k]] * tableau[k][column];
        }
        duals[i] = if flipped[i] { -y } else { y };
    }

    LpSolution {
        status: SolverStatus::Optimal,
        objective,
        values,
        duals,
    }
}

fn model_is_basic(basis: &[usize], column: usize) -> bool {
    basis.iter().any(|&b| b == column)
}

/// Gauss-Jordan pivot on `tableau[row][column]`, updating the basis.
fn pivot(
    tableau: &mut [Vec<f64>],
    basis: &mut [usize],
    row: usize,
    column: usize,
    total: usize,
    m: usize,
) {
    let pivot_value = tableau[row][column];
    for value in tableau[row].iter_mut() {
        *value /= pivot_value;
    }
    for i in 0..m {
        if i != row {
            let factor = tableau[i][column];
            if factor.abs() > EPS {
                for j in 0..=total {
                    tableau[i][j] -= factor * tableau[row][j];
                }
            }
        }
    }
    basis[row] = column;
}

/// Depth-first branch-and-bound over the fractional integer variables.
fn branch_and_bound(
    model: &LpModel,
    deadline: Option<Instant>,
    solver: &SimplexSolver,
) -> LpSolution {
    let mut best: Option<LpSolution> = None;
    let mut stack = vec![(model.lower_bounds.clone(), model.upper_bounds.clone())];
    let mut nodes = 0;
    let mut timed_out = false;

    while let Some((lower, upper)) = stack.pop() {
        nodes += 1;
        if nodes > solver.max_nodes {
            timed_out = true;
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
        }

        let relaxation = solve_relaxation(model, &lower, &upper, deadline, solver.max_pivots);
        match relaxation.status {
            SolverStatus::Optimal => {}
            SolverStatus::TimedOut => {
                timed_out = true;
                break;
            }
            // Infeasible or unbounded nodes are pruned.
            _ => continue,
        }

        if let Some(ref incumbent) = best {
            if relaxation.objective >= incumbent.objective - 1e-9 {
                continue;
            }
        }

        // Most fractional integer variable, if any.
        let mut branch_variable = None;
        let mut best_fraction = 1e-6;
        for j in 0..model.num_variables() {
            if model.integer[j] {
                let value = relaxation.values[j];
                let fraction = (value - value.round()).abs();
                if fraction > best_fraction {
                    best_fraction = fraction;
                    branch_variable = Some(j);
                }
            }
        }

        match branch_variable {
            None => {
                debug!(
                    "branch-and-bound incumbent {} after {} nodes",
                    relaxation.objective, nodes
                );
                best = Some(relaxation);
            }
            Some(j) => {
                let value = relaxation.values[j];
                let mut down_upper = upper.clone();
                down_upper[j] = value.floor();
                let mut up_lower = lower.clone();
                up_lower[j] = value.ceil();
                stack.push((lower, down_upper));
                stack.push((up_lower, upper));
            }
        }
    }

    match best {
        Some(mut solution) => {
            // A time-limited run with an incumbent is a degraded result,
            // not a failure.
            if timed_out {
                solution.status = SolverStatus::TimedOut;
            }
            solution
        }
        None => LpSolution::without_solution(if timed_out {
            SolverStatus::TimedOut
        } else {
            SolverStatus::Infeasible
        }),
    }
}
