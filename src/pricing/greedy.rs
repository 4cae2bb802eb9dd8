//! Randomized greedy column search.
//!
//! A cheap pre-pass run before the main pricing attempt: random path
//! extensions from the source, biased towards low reduced-cost arcs. Only
//! valid for capacity, stop-count and duration constraints (no time
//! windows), mirroring when the loop enables it.

use rand::Rng;

use crate::pricing::filters::PricingGraph;
use crate::pricing::labeling::{PricedPath, ResourceLimits, NEGATIVE_TOLERANCE};
use crate::problem::NodeKind;

/// Number of random extensions per invocation.
pub const DEFAULT_RUNS: usize = 20;

/// Run `runs` random extensions and return the negative-reduced-cost paths
/// found, deduplicated.
pub fn search<R: Rng>(
    pricing: &PricingGraph,
    limits: &ResourceLimits,
    runs: usize,
    rng: &mut R,
) -> Vec<PricedPath> {
    let mut found: Vec<PricedPath> = Vec::new();

    for _ in 0..runs {
        if let Some(path) = extend_once(pricing, limits, rng) {
            if found.iter().all(|existing| existing.nodes != path.nodes) {
                found.push(path);
            }
        }
    }

    found.sort_by(|a, b| {
        a.reduced_cost
            .partial_cmp(&b.reduced_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    found
}

fn extend_once<R: Rng>(
    pricing: &PricingGraph,
    limits: &ResourceLimits,
    rng: &mut R,
) -> Option<PricedPath> {
    let graph = &pricing.graph;
    let mut current = pricing.source;
    let mut nodes = vec![graph[current].id];
    let mut visited = vec![false; graph.node_count()];
    visited[current.index()] = true;

    let mut weight = 0.0;
    let mut cost = 0.0;
    let mut load = 0.0;
    let mut time = 0.0;
    let mut stops = 0usize;

    while current != pricing.sink {
        // Collect feasible extensions.
        let mut candidates = Vec::new();
        let mut walker = graph.neighbors(current).detach();
        while let Some((edge, next)) = walker.next(graph) {
            if visited[next.index()] {
                continue;
            }
            let head = &graph[next];
            if let Some(capacity) = limits.capacity {
                if load + head.demand > capacity + 1e-9 {
                    continue;
                }
            }
            if let Some(duration) = limits.duration {
                let service = graph[current].service_time;
                if time + service + graph[edge].time + head.service_time > duration + 1e-9 {
                    continue;
                }
            }
            if let Some(num_stops) = limits.num_stops {
                if stops + usize::from(head.kind == NodeKind::Customer) > num_stops {
                    continue;
                }
            }
            candidates.push((edge, next));
        }

        if candidates.is_empty() {
            return None;
        }

        // Bias towards low weight: sort and pick among the best three.
        candidates.sort_by(|a, b| {
            graph[a.0]
                .weight
                .partial_cmp(&graph[b.0].weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let pick = rng.gen_range(0..candidates.len().min(3));
        let (edge, next) = candidates[pick];

        weight += graph[edge].weight;
        cost += graph[edge].cost;
        time += graph[current].service_time + graph[edge].time;
        load += graph[next].demand;
        if graph[next].kind == NodeKind::Customer {
            stops += 1;
        }
        visited[next.index()] = true;
        nodes.push(graph[next].id);
        current = next;
    }

    if weight < NEGATIVE_TOLERANCE {
        Some(PricedPath {
            nodes,
            cost,
            reduced_cost: weight,
        })
    } else {
        None
    }
}
