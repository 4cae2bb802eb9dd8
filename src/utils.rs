//! Utility functions for the column generation solver.

use std::time::Duration;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Binary knapsack with identical profits of weight 1.
///
/// Returns the maximum number of items whose weights fit into `capacity`.
/// Used to bound the number of stops a single vehicle can make.
pub fn knapsack(weights: &[u64], capacity: u64) -> usize {
    let cap = capacity as usize;
    let mut best = vec![0usize; cap + 1];

    for &w in weights {
        let w = w as usize;
        if w > cap {
            continue;
        }
        // Iterate capacities downwards so each item is used at most once.
        for j in (w..=cap).rev() {
            let candidate = best[j - w] + 1;
            if candidate > best[j] {
                best[j] = candidate;
            }
        }
    }

    best[cap]
}
