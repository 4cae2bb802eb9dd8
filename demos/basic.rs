//! Basic example of using the cg_vrp library.
//!
//! Solves a small capacitated instance end to end and prints the selected
//! routes, optionally as JSON.

use clap::Parser;
use std::time::Duration;

use cg_vrp::config::SolverConfig;
use cg_vrp::hyper::PerformanceMeasure;
use cg_vrp::pricing::StrategyKind;
use cg_vrp::problem::{Arc, Node, Problem};
use cg_vrp::VehicleRoutingProblem;

#[derive(Parser, Debug)]
#[command(about = "Solve a demo VRP instance with column generation")]
struct Args {
    /// Number of customers around the depot.
    #[arg(long, default_value_t = 6)]
    customers: usize,

    /// Vehicle capacity.
    #[arg(long, default_value_t = 4.0)]
    capacity: f64,

    /// Pricing strategy: BestPaths, BestEdges1, BestEdges2, Exact or Hyper.
    #[arg(long, default_value = "Hyper")]
    pricing: String,

    /// Time limit in seconds.
    #[arg(long)]
    time_limit: Option<u64>,

    /// Print the solution as JSON.
    #[arg(long)]
    json: bool,
}

/// Customers on a ring around the depot, with Euclidean costs.
fn ring_problem(customers: usize, capacity: f64) -> Problem {
    let sink = customers + 1;
    let position = |i: usize| -> (f64, f64) {
        if i == 0 || i == sink {
            return (0.0, 0.0);
        }
        let angle = (i - 1) as f64 / customers as f64 * std::f64::consts::TAU;
        (50.0 * angle.cos(), 50.0 * angle.sin())
    };
    let distance = |a: usize, b: usize| -> f64 {
        let (ax, ay) = position(a);
        let (bx, by) = position(b);
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    };

    let mut nodes = vec![Node::source(0)];
    for i in 1..=customers {
        nodes.push(Node::customer(i, 1.0 + (i % 3) as f64));
    }
    nodes.push(Node::sink(sink));

    let mut arcs = Vec::new();
    for i in 1..=customers {
        arcs.push(Arc::new(0, i, distance(0, i)));
        arcs.push(Arc::new(i, sink, distance(i, 0)));
        for j in 1..=customers {
            if i != j {
                arcs.push(Arc::new(i, j, distance(i, j)));
            }
        }
    }

    Problem::new("ring_demo", nodes, arcs).with_load_capacity(capacity)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let problem = ring_problem(args.customers, args.capacity);
    println!(
        "Solving {} with {} customers, capacity {}",
        problem.name, args.customers, args.capacity
    );

    let mut config = SolverConfig::new()
        .with_performance_measure(PerformanceMeasure::RelativeImprovement)
        .with_seed(42);
    config = match args.pricing.as_str() {
        "Hyper" => config.with_adaptive_pricing(),
        "BestPaths" => config.with_pricing_strategy(StrategyKind::BestPaths),
        "BestEdges1" => config.with_pricing_strategy(StrategyKind::BestEdges1),
        "BestEdges2" => config.with_pricing_strategy(StrategyKind::BestEdges2),
        "Exact" => config.with_pricing_strategy(StrategyKind::Exact),
        other => return Err(format!("unknown pricing strategy: {}", other).into()),
    };
    if let Some(limit) = args.time_limit {
        config = config.with_time_limit(Duration::from_secs(limit));
    }

    let mut solver = VehicleRoutingProblem::new(problem, config);
    let value = solver.solve(&[], &[])?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(solver.best_routes())?);
    } else {
        println!("Best value: {:.2}", value);
        for route in solver.best_routes() {
            println!(
                "Route {} (type {}, cost {:.2}): {:?}",
                route.id, route.vehicle_type, route.cost, route.nodes
            );
        }
        println!("{}", solver.statistics().format());
    }

    Ok(())
}
