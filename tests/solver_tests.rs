//! Unit tests for the built-in LP/MIP backend.

use cg_vrp::solver::{LinearSolver, LpModel, RowSense, SimplexSolver, SolverStatus};

fn solver() -> SimplexSolver {
    SimplexSolver::new()
}

#[test]
fn lp_minimizes_simple_covering() {
    // min x0 + 2 x1 s.t. x0 + x1 >= 1, x in [0, 1].
    let mut model = LpModel::new();
    let row = model.add_row(RowSense::Ge, 1.0);
    model.add_variable(1.0, 0.0, 1.0, false, &[(row, 1.0)]);
    model.add_variable(2.0, 0.0, 1.0, false, &[(row, 1.0)]);

    let solution = solver().solve_lp(&model, None);
    assert_eq!(solution.status, SolverStatus::Optimal);
    assert!((solution.objective - 1.0).abs() < 1e-6);
    assert!((solution.values[0] - 1.0).abs() < 1e-6);
    assert!(solution.values[1].abs() < 1e-6);
}

#[test]
fn lp_reports_covering_dual() {
    // min 3 x s.t. x >= 2 gives dual 3 on the covering row.
    let mut model = LpModel::new();
    let row = model.add_row(RowSense::Ge, 2.0);
    model.add_variable(3.0, 0.0, f64::INFINITY, false, &[(row, 1.0)]);

    let solution = solver().solve_lp(&model, None);
    assert_eq!(solution.status, SolverStatus::Optimal);
    assert!((solution.objective - 6.0).abs() < 1e-6);
    assert!((solution.duals[0] - 3.0).abs() < 1e-6);
}

#[test]
fn lp_detects_infeasible() {
    // x <= 1 and x >= 2 cannot both hold.
    let mut model = LpModel::new();
    let le = model.add_row(RowSense::Le, 1.0);
    let ge = model.add_row(RowSense::Ge, 2.0);
    model.add_variable(1.0, 0.0, f64::INFINITY, false, &[(le, 1.0), (ge, 1.0)]);

    let solution = solver().solve_lp(&model, None);
    assert_eq!(solution.status, SolverStatus::Infeasible);
}

#[test]
fn lp_detects_unbounded() {
    // min -x with x >= 1 and no upper bound.
    let mut model = LpModel::new();
    let row = model.add_row(RowSense::Ge, 1.0);
    model.add_variable(-1.0, 0.0, f64::INFINITY, false, &[(row, 1.0)]);

    let solution = solver().solve_lp(&model, None);
    assert_eq!(solution.status, SolverStatus::Unbounded);
}

#[test]
fn ip_picks_cheapest_integral_cover() {
    // Two singletons against one cheaper pair cover.
    let mut model = LpModel::new();
    let row_a = model.add_row(RowSense::Ge, 1.0);
    let row_b = model.add_row(RowSense::Ge, 1.0);
    model.add_variable(1.0, 0.0, 1.0, true, &[(row_a, 1.0)]);
    model.add_variable(1.0, 0.0, 1.0, true, &[(row_b, 1.0)]);
    model.add_variable(1.5, 0.0, 1.0, true, &[(row_a, 1.0), (row_b, 1.0)]);

    let solution = solver().solve_ip(&model, None);
    assert_eq!(solution.status, SolverStatus::Optimal);
    assert!((solution.objective - 1.5).abs() < 1e-6);
    assert!((solution.values[2] - 1.0).abs() < 1e-6);
}

#[test]
fn ip_branches_away_from_fractional_lp() {
    // Classic fractional covering: three pair-covers over three rows. The
    // LP optimum is 1.5 with every variable at one half; the IP needs two.
    let mut model = LpModel::new();
    let rows: Vec<usize> = (0..3).map(|_| model.add_row(RowSense::Ge, 1.0)).collect();
    model.add_variable(1.0, 0.0, 1.0, true, &[(rows[0], 1.0), (rows[1], 1.0)]);
    model.add_variable(1.0, 0.0, 1.0, true, &[(rows[1], 1.0), (rows[2], 1.0)]);
    model.add_variable(1.0, 0.0, 1.0, true, &[(rows[0], 1.0), (rows[2], 1.0)]);

    let relaxed = solver().solve_lp(&model, None);
    assert!((relaxed.objective - 1.5).abs() < 1e-6);

    let integral = solver().solve_ip(&model, None);
    assert_eq!(integral.status, SolverStatus::Optimal);
    assert!((integral.objective - 2.0).abs() < 1e-6);
}

#[test]
fn incremental_column_improves_objective() {
    let mut model = LpModel::new();
    let row = model.add_row(RowSense::Ge, 1.0);
    model.add_variable(5.0, 0.0, 1.0, false, &[(row, 1.0)]);

    let before = solver().solve_lp(&model, None);
    assert!((before.objective - 5.0).abs() < 1e-6);

    model.add_variable(2.0, 0.0, 1.0, false, &[(row, 1.0)]);
    let after = solver().solve_lp(&model, None);
    assert!((after.objective - 2.0).abs() < 1e-6);
    assert!(after.objective <= before.objective + 1e-9);
}

#[test]
fn equality_rows_are_respected() {
    // min x0 + x1 s.t. x0 + x1 = 2 with x <= 1 forces both to one.
    let mut model = LpModel::new();
    let row = model.add_row(RowSense::Eq, 2.0);
    model.add_variable(1.0, 0.0, 1.0, false, &[(row, 1.0)]);
    model.add_variable(1.0, 0.0, 1.0, false, &[(row, 1.0)]);

    let solution = solver().solve_lp(&model, None);
    assert_eq!(solution.status, SolverStatus::Optimal);
    assert!((solution.values[0] - 1.0).abs() < 1e-6);
    assert!((solution.values[1] - 1.0).abs() < 1e-6);
}
