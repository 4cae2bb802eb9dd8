//! Reduced-cost weighting and the heuristic subgraph restrictions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::master::Duals;
use crate::problem::{NodeKind, WorkNode, WorkingGraph};

/// Arc payload of the pricing graph: original cost, reduced-cost weight and
/// travel time for one vehicle type.
#[derive(Debug, Clone, Copy)]
pub struct PricingArc {
    pub cost: f64,
    pub weight: f64,
    pub time: f64,
}

/// The graph a single pricing attempt searches: the working graph with
/// duals folded into arc weights for one vehicle type.
#[derive(Debug, Clone)]
pub struct PricingGraph {
    pub graph: DiGraph<WorkNode, PricingArc>,
    pub source: NodeIndex,
    pub sink: NodeIndex,
}

impl PricingGraph {
    /// Fold duals into arc weights: each arc pays the dual of its tail
    /// customer, and source-outgoing arcs additionally pay the
    /// vehicle-count dual of the priced type. A route's accumulated weight
    /// is then exactly its reduced cost.
    pub fn build(working: &WorkingGraph, duals: &Duals, vehicle_type: usize) -> Self {
        let mut graph = DiGraph::with_capacity(
            working.graph.node_count(),
            working.graph.edge_count(),
        );
        let mut map = std::collections::HashMap::new();
        for v in working.graph.node_indices() {
            map.insert(v, graph.add_node(working.graph[v].clone()));
        }
        for edge in working.graph.edge_indices() {
            let (from, to) = working.graph.edge_endpoints(edge).expect("edge exists");
            let tail = &working.graph[from];
            let arc = &working.graph[edge];
            let mut weight = arc.costs[vehicle_type];
            if tail.kind == NodeKind::Customer {
                weight -= duals.node(tail.id);
            }
            if tail.kind == NodeKind::Source {
                weight -= duals.vehicle_type(vehicle_type);
            }
            graph.add_edge(
                map[&from],
                map[&to],
                PricingArc {
                    cost: arc.costs[vehicle_type],
                    weight,
                    time: arc.time,
                },
            );
        }
        PricingGraph {
            graph,
            source: map[&working.source],
            sink: map[&working.sink],
        }
    }

    /// Restriction to arcs on the `k` lowest-weight simple source-sink
    /// paths, found by best-first enumeration.
    pub fn best_paths(&self, k: usize) -> PricingGraph {
        let paths = self.enumerate_paths(k, 20_000);
        let mut keep = vec![false; self.graph.edge_count()];
        for path in &paths {
            for pair in path.windows(2) {
                if let Some(edge) = self.graph.find_edge(pair[0], pair[1]) {
                    keep[edge.index()] = true;
                }
            }
        }
        self.filtered(|edge| keep[edge])
    }

    /// Restriction dropping arcs whose weight exceeds `alpha` times the
    /// largest arc weight. With no positive weight nothing is dropped.
    pub fn best_edges1(&self, alpha: f64) -> PricingGraph {
        let max_weight = self
            .graph
            .edge_indices()
            .map(|e| self.graph[e].weight)
            .fold(f64::NEG_INFINITY, f64::max);
        if max_weight <= 0.0 {
            return self.clone();
        }
        let threshold = alpha * max_weight;
        let weights: Vec<f64> = self
            .graph
            .edge_indices()
            .map(|e| self.graph[e].weight)
            .collect();
        self.filtered(|edge| weights[edge] <= threshold)
    }

    /// Restriction dropping the `ratio` fraction of highest-weight arcs.
    pub fn best_edges2(&self, ratio: f64) -> PricingGraph {
        let mut order: Vec<(usize, f64)> = self
            .graph
            .edge_indices()
            .map(|e| (e.index(), self.graph[e].weight))
            .collect();
        order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let to_drop = ((order.len() as f64) * ratio).ceil() as usize;
        let mut keep = vec![true; self.graph.edge_count()];
        for &(edge, _) in order.iter().take(to_drop) {
            keep[edge] = false;
        }
        self.filtered(|edge| keep[edge])
    }

    fn filtered(&self, keep: impl Fn(usize) -> bool) -> PricingGraph {
        let mut graph = DiGraph::new();
        let mut map = std::collections::HashMap::new();
        for v in self.graph.node_indices() {
            map.insert(v, graph.add_node(self.graph[v].clone()));
        }
        for edge in self.graph.edge_indices() {
            if keep(edge.index()) {
                let (from, to) = self.graph.edge_endpoints(edge).expect("edge exists");
                graph.add_edge(map[&from], map[&to], self.graph[edge]);
            }
        }
        PricingGraph {
            graph,
            source: map[&self.source],
            sink: map[&self.sink],
        }
    }

    /// Best-first enumeration of up to `k` simple source-sink paths by
    /// accumulated weight, with a cap on queue pops. Exact for
    /// non-negative weights, a useful approximation otherwise.
    fn enumerate_paths(&self, k: usize, max_pops: usize) -> Vec<Vec<NodeIndex>> {
        #[derive(Debug)]
        struct Partial {
            weight: f64,
            path: Vec<NodeIndex>,
        }
        impl PartialEq for Partial {
            fn eq(&self, other: &Self) -> bool {
                self.weight == other.weight
            }
        }
        impl Eq for Partial {}
        impl PartialOrd for Partial {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Partial {
            fn cmp(&self, other: &Self) -> Ordering {
                // Min-heap on weight.
                other
                    .weight
                    .partial_cmp(&self.weight)
                    .unwrap_or(Ordering::Equal)
            }
        }

        let mut found = Vec::new();
        let mut heap = BinaryHeap::new();
        heap.push(Partial {
            weight: 0.0,
            path: vec![self.source],
        });
        let mut pops = 0;

        while let Some(partial) = heap.pop() {
            pops += 1;
            if pops > max_pops || found.len() >= k {
                break;
            }
            let last = *partial.path.last().expect("non-empty path");
            if last == self.sink {
                found.push(partial.path);
                continue;
            }
            let mut walker = self.graph.neighbors(last).detach();
            while let Some((edge, next)) = walker.next(&self.graph) {
                if partial.path.contains(&next) {
                    continue;
                }
                let mut path = partial.path.clone();
                path.push(next);
                heap.push(Partial {
                    weight: partial.weight + self.graph[edge].weight,
                    path,
                });
            }
        }

        found
    }
}
