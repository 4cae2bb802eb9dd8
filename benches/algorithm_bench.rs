//! Benchmarks for the column generation solver.

#[cfg(feature = "bench")]
extern crate criterion;

#[cfg(feature = "bench")]
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cg_vrp::config::SolverConfig;
use cg_vrp::master::Duals;
use cg_vrp::pricing::{PricingOracle, StrategyKind};
use cg_vrp::problem::{Arc, Node, Problem, WorkingGraph};
use cg_vrp::VehicleRoutingProblem;
use std::time::Duration;

/// Create a benchmark problem with `size` customers on a grid.
fn create_benchmark_problem(size: usize) -> Problem {
    let grid_size = (size as f64).sqrt().ceil() as usize;
    let position = |i: usize| -> (f64, f64) {
        if i == 0 {
            return (0.0, 0.0);
        }
        let row = (i - 1) / grid_size;
        let col = (i - 1) % grid_size;
        (col as f64 * 10.0, row as f64 * 10.0)
    };
    let distance = |a: usize, b: usize| -> f64 {
        let (ax, ay) = position(a);
        let (bx, by) = position(b);
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    };

    let sink = size + 1;
    let mut nodes = vec![Node::source(0)];
    for i in 1..=size {
        nodes.push(Node::customer(i, 1.0));
    }
    nodes.push(Node::sink(sink));

    let mut arcs = Vec::new();
    for i in 1..=size {
        arcs.push(Arc::new(0, i, distance(0, i)));
        arcs.push(Arc::new(i, sink, distance(i, 0)));
        for j in 1..=size {
            if i != j {
                arcs.push(Arc::new(i, j, distance(i, j)));
            }
        }
    }

    Problem::new(format!("BenchProblem_{}", size), nodes, arcs).with_load_capacity(4.0)
}

#[cfg(feature = "bench")]
fn benchmark_working_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("working_graph");

    for size in [5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let problem = create_benchmark_problem(size);
            b.iter(|| WorkingGraph::derive(&problem, &[]).unwrap());
        });
    }

    group.finish();
}

#[cfg(feature = "bench")]
fn benchmark_exact_pricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_pricing");

    for size in [5, 10].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let problem = create_benchmark_problem(size);
            let working = WorkingGraph::derive(&problem, &[]).unwrap();
            let mut duals = Duals::default();
            for i in 1..=size {
                duals.set_node(i, 15.0);
            }

            b.iter(|| {
                let oracle = PricingOracle::new(&working, &problem);
                oracle.solve(&duals, 0, StrategyKind::Exact, None)
            });
        });
    }

    group.finish();
}

#[cfg(feature = "bench")]
fn benchmark_full_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_solve");
    group.measurement_time(Duration::from_secs(30));

    for size in [5, 10].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let problem = create_benchmark_problem(size);
            let config = SolverConfig::new()
                .with_pricing_strategy(StrategyKind::BestEdges1)
                .with_max_iterations(50)
                .with_time_limit(Duration::from_secs(10));

            b.iter(|| {
                let mut solver = VehicleRoutingProblem::new(problem.clone(), config.clone());
                solver.solve(&[], &[]).unwrap()
            });
        });
    }

    group.finish();
}

#[cfg(feature = "bench")]
criterion_group!(
    benches,
    benchmark_working_graph,
    benchmark_exact_pricing,
    benchmark_full_solve
);

#[cfg(feature = "bench")]
criterion_main!(benches);
