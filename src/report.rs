//! Diagnostics: the per-iteration run log and the run summary.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::format_duration;

/// Everything worth recording about one column-generation iteration under
/// adaptive strategy selection. Field order matches the CSV columns.
#[derive(Debug, Clone, Default)]
pub struct IterationRecord {
    pub iteration: u64,
    pub objective: f64,
    /// Choice counts per strategy: BestPaths, BestEdges1, BestEdges2, Exact.
    pub choices: [u32; 4],
    pub average_runtime: f64,
    pub quality: [f64; 4],
    pub selection_score: [f64; 4],
    pub exploration: f64,
    pub theta: f64,
    pub accepted_columns: [u32; 4],
    pub active_paths: [u32; 4],
    pub no_improvement: u32,
    pub total_active_paths: usize,
}

/// Appending CSV writer for [`IterationRecord`]s.
///
/// Creates the file with a header on first use, appends without one
/// afterwards.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

const HEADER: [&str; 27] = [
    "Iteration",
    "Objective",
    "Hyper choice BP",
    "Hyper choice BE1",
    "Hyper choice BE2",
    "Hyper choice Exact",
    "Average runtime",
    "Quality BP",
    "Quality BE1",
    "Quality BE2",
    "Quality Exact",
    "Selection score BP",
    "Selection score BE1",
    "Selection score BE2",
    "Selection score Exact",
    "Exploration",
    "Theta",
    "Accepted columns BP",
    "Accepted columns BE1",
    "Accepted columns BE2",
    "Accepted columns Exact",
    "Active path BP",
    "Active path BE1",
    "Active path BE2",
    "Active path Exact",
    "No improvement",
    "Total active paths",
];

impl RunLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RunLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one record, writing the header when the file is new.
    pub fn append(&self, record: &IterationRecord) -> Result<(), csv::Error> {
        let fresh = !self.path.is_file();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if fresh {
            writer.write_record(HEADER)?;
        }

        let mut row: Vec<String> = Vec::with_capacity(HEADER.len());
        row.push(record.iteration.to_string());
        row.push(record.objective.to_string());
        for count in record.choices {
            row.push(count.to_string());
        }
        row.push(record.average_runtime.to_string());
        for quality in record.quality {
            row.push(quality.to_string());
        }
        for score in record.selection_score {
            row.push(score.to_string());
        }
        row.push(record.exploration.to_string());
        row.push(record.theta.to_string());
        for accepted in record.accepted_columns {
            row.push(accepted.to_string());
        }
        for active in record.active_paths {
            row.push(active.to_string());
        }
        row.push(record.no_improvement.to_string());
        row.push(record.total_active_paths.to_string());

        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}

/// Summary of one solve call.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub iterations: u64,
    pub runtime: Duration,
    pub best_value: f64,
    pub best_route_count: usize,
    pub lower_bound: Option<f64>,
    pub columns_generated: usize,
}

impl RunStatistics {
    /// Integrality gap against the final relaxed lower bound.
    pub fn gap(&self) -> Option<f64> {
        self.lower_bound.map(|bound| self.best_value - bound)
    }

    /// Format the statistics as a string.
    pub fn format(&self) -> String {
        format!(
            "Run Statistics:
- Iterations: {}
- Runtime: {}
- Best Value: {:.2}
- Routes: {}
- Lower Bound: {}
- Columns Generated: {}",
            self.iterations,
            format_duration(self.runtime),
            self.best_value,
            self.best_route_count,
            self.lower_bound
                .map(|bound| format!("{:.2}", bound))
                .unwrap_or_else(|| "-".to_string()),
            self.columns_generated,
        )
    }
}
