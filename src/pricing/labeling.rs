//! Resource-constrained shortest path search by forward labeling.
//!
//! Monodirectional label extension from the source with dominance over
//! (reduced cost, load, time, stop count) and elementarity through visited
//! bitmasks. The time budget is advisory: it is checked between label
//! expansions, and whatever negative-reduced-cost paths were completed by
//! then are returned.

use std::collections::VecDeque;
use std::time::Instant;

use petgraph::graph::NodeIndex;

use crate::pricing::filters::PricingGraph;
use crate::problem::NodeKind;

/// Reduced cost below which a path counts as a column.
pub const NEGATIVE_TOLERANCE: f64 = -1e-3;

/// Per-vehicle-type resource limits for the search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits {
    pub num_stops: Option<usize>,
    pub capacity: Option<f64>,
    pub duration: Option<f64>,
    pub time_windows: bool,
}

/// A source-sink path with negative reduced cost.
#[derive(Debug, Clone)]
pub struct PricedPath {
    /// Node ids from source to sink.
    pub nodes: Vec<usize>,
    /// Actual cost of the path.
    pub cost: f64,
    /// Reduced cost under the duals the graph was built with.
    pub reduced_cost: f64,
}

#[derive(Debug, Clone)]
struct Label {
    node: NodeIndex,
    weight: f64,
    cost: f64,
    load: f64,
    time: f64,
    stops: usize,
    visited: Vec<u64>,
    predecessor: Option<usize>,
}

impl Label {
    fn dominates(&self, other: &Label) -> bool {
        self.weight <= other.weight + 1e-12
            && self.load <= other.load + 1e-12
            && self.time <= other.time + 1e-12
            && self.stops <= other.stops
            && is_subset(&self.visited, &other.visited)
    }
}

fn is_subset(a: &[u64], b: &[u64]) -> bool {
    a.iter().zip(b.iter()).all(|(&x, &y)| x & y == x)
}

fn mark(mask: &mut [u64], index: usize) {
    mask[index / 64] |= 1 << (index % 64);
}

fn is_marked(mask: &[u64], index: usize) -> bool {
    mask[index / 64] & (1 << (index % 64)) != 0
}

/// Run the labeling search and return every negative-reduced-cost path
/// found, best first.
pub fn search(
    pricing: &PricingGraph,
    limits: &ResourceLimits,
    deadline: Option<Instant>,
    max_labels: usize,
) -> Vec<PricedPath> {
    let graph = &pricing.graph;
    let words = (graph.node_count() + 63) / 64;

    let mut arena: Vec<Label> = Vec::new();
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); graph.node_count()];
    let mut queue: VecDeque<usize> = VecDeque::new();

    let mut start_mask = vec![0u64; words];
    mark(&mut start_mask, pricing.source.index());
    arena.push(Label {
        node: pricing.source,
        weight: 0.0,
        cost: 0.0,
        load: 0.0,
        time: graph[pricing.source].lower,
        stops: 0,
        visited: start_mask,
        predecessor: None,
    });
    buckets[pricing.source.index()].push(0);
    queue.push_back(0);

    let mut expansions = 0usize;
    while let Some(label_id) = queue.pop_front() {
        expansions += 1;
        if arena.len() > max_labels {
            break;
        }
        if let Some(deadline) = deadline {
            if expansions % 256 == 0 && Instant::now() >= deadline {
                break;
            }
        }

        let current = arena[label_id].clone();
        if current.node == pricing.sink {
            continue;
        }

        let mut walker = graph.neighbors(current.node).detach();
        while let Some((edge, next)) = walker.next(graph) {
            if is_marked(&current.visited, next.index()) {
                continue;
            }
            let arc = graph[edge];
            let head = &graph[next];

            let load = current.load + head.demand;
            if let Some(capacity) = limits.capacity {
                if load > capacity + 1e-9 {
                    continue;
                }
            }

            let service = graph[current.node].service_time;
            let mut time = current.time + service + arc.time;
            if limits.time_windows {
                time = time.max(head.lower);
                if time > head.upper + 1e-9 {
                    continue;
                }
            }
            if let Some(duration) = limits.duration {
                if time + head.service_time > duration + 1e-9 {
                    continue;
                }
            }

            let stops = current.stops + usize::from(head.kind == NodeKind::Customer);
            if let Some(num_stops) = limits.num_stops {
                if stops > num_stops {
                    continue;
                }
            }

            let mut visited = current.visited.clone();
            mark(&mut visited, next.index());
            let candidate = Label {
                node: next,
                weight: current.weight + arc.weight,
                cost: current.cost + arc.cost,
                load,
                time,
                stops,
                visited,
                predecessor: Some(label_id),
            };

            // Dominance in both directions against the bucket.
            let bucket = &mut buckets[next.index()];
            if bucket.iter().any(|&id| arena[id].dominates(&candidate)) {
                continue;
            }
            bucket.retain(|&id| !candidate.dominates(&arena[id]));

            let id = arena.len();
            arena.push(candidate);
            buckets[next.index()].push(id);
            if next != pricing.sink {
                queue.push_back(id);
            }
        }
    }

    let mut paths: Vec<PricedPath> = buckets[pricing.sink.index()]
        .iter()
        .filter(|&&id| arena[id].weight < NEGATIVE_TOLERANCE)
        .map(|&id| {
            let mut nodes = Vec::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                nodes.push(graph[arena[current].node].id);
                cursor = arena[current].predecessor;
            }
            nodes.reverse();
            PricedPath {
                nodes,
                cost: arena[id].cost,
                reduced_cost: arena[id].weight,
            }
        })
        .collect();

    paths.sort_by(|a, b| {
        a.reduced_cost
            .partial_cmp(&b.reduced_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    paths
}
