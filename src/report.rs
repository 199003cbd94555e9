//! Run reports: the fixed-field statistics line consumed by aggregation
//! scripts, and JSON output of solution summaries.

use crate::heuristics::{GraspConfig, SearchStatistics};
use crate::instance::Instance;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// One whitespace-separated line describing a run:
///
/// `m D B |V| |E| |V_L| |E_L| time_limit seed elapsed solutions_found
/// best_primal best_dual feasible iterations best_iteration best_time
/// constructed_feasible repaired_feasible probabilities counts means`
///
/// `|V_L|` and `|E_L|` are the sizes of the line graph with hub. Per-alpha
/// vectors are comma-joined; absent values are written as `-`.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsLine {
    pub num_districts: usize,
    pub capacity: f64,
    pub balance: f64,
    pub num_vertices: usize,
    pub num_edges: usize,
    pub line_vertices: usize,
    pub line_edges: usize,
    pub time_limit: f64,
    pub seed: u64,
    pub elapsed: f64,
    pub solutions_found: u64,
    pub best_primal: Option<f64>,
    pub best_dual: Option<f64>,
    pub feasible: bool,
    pub iterations: u64,
    pub best_iteration: Option<u64>,
    pub best_time: Option<f64>,
    pub constructed_feasible: u64,
    pub repaired_feasible: u64,
    pub probabilities: Vec<f64>,
    pub counts: Vec<u64>,
    pub means: Vec<f64>,
}

impl StatisticsLine {
    pub fn new(instance: &Instance, config: &GraspConfig, stats: &SearchStatistics) -> Self {
        let line = instance.line_graph_with_hub();
        StatisticsLine {
            num_districts: instance.num_districts(),
            capacity: instance.capacity(),
            balance: instance.balance(),
            num_vertices: instance.graph().num_vertices(),
            num_edges: instance.num_edges(),
            line_vertices: line.num_vertices(),
            line_edges: line.num_edges(),
            time_limit: config.time_limit,
            seed: config.seed,
            elapsed: stats.elapsed,
            solutions_found: stats.solutions_found,
            best_primal: stats.best_value,
            best_dual: stats.dual_bound,
            feasible: stats.is_feasible(),
            iterations: stats.iterations,
            best_iteration: stats.best_iteration,
            best_time: stats.best_time,
            constructed_feasible: stats.constructed_feasible,
            repaired_feasible: stats.repaired_feasible,
            probabilities: stats.probabilities(),
            counts: stats.sample_counts(),
            means: stats.mean_values(),
        }
    }
}

fn optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn joined<T: fmt::Display>(values: &[T]) -> String {
    if values.is_empty() {
        return "-".to_string();
    }
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

impl fmt::Display for StatisticsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {:.3} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.num_districts,
            self.capacity,
            self.balance,
            self.num_vertices,
            self.num_edges,
            self.line_vertices,
            self.line_edges,
            self.time_limit,
            self.seed,
            self.elapsed,
            self.solutions_found,
            optional(self.best_primal),
            optional(self.best_dual),
            u8::from(self.feasible),
            self.iterations,
            optional(self.best_iteration),
            optional(self.best_time.map(|t| format!("{:.3}", t))),
            self.constructed_feasible,
            self.repaired_feasible,
            joined(&self.probabilities.iter().map(|p| format!("{:.4}", p)).collect::<Vec<_>>()),
            joined(&self.counts),
            joined(&self.means.iter().map(|m| format!("{:.2}", m)).collect::<Vec<_>>()),
        )
    }
}

/// Append a statistics line to `path`, creating the file if needed.
pub fn append_statistics_line<P: AsRef<Path>>(path: P, line: &StatisticsLine) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open statistics file {}", path.display()))?;
    writeln!(file, "{}", line)
        .with_context(|| format!("cannot write statistics file {}", path.display()))
}

/// Write any serializable value as pretty JSON.
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).context("cannot serialize report")?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::ReactiveGrasp;

    const PATH_INSTANCE: &str = "2\n2\n0\n3 2\n0 0\n1 0\n2 0\n0 1 1\n1 2 1\n1 1\n1 1\n";

    #[test]
    fn test_statistics_line_fields() {
        let instance = Instance::parse(PATH_INSTANCE).unwrap();
        let config = GraspConfig {
            time_limit: 600.0,
            seed: 3,
            alpha_count: 2,
            max_iterations: Some(4),
            ..GraspConfig::default()
        };
        let outcome = ReactiveGrasp::new(config.clone()).run(&instance);
        let line = StatisticsLine::new(&instance, &config, &outcome.statistics);
        let text = line.to_string();
        let fields: Vec<&str> = text.split_whitespace().collect();

        assert_eq!(fields.len(), 22);
        assert_eq!(&fields[..9], &["2", "2", "0", "3", "2", "3", "3", "600", "3"]);
        assert_eq!(fields[11], "2");
        assert_eq!(fields[12], "-");
        assert_eq!(fields[13], "1");
        assert_eq!(fields[14], "4");
        assert_eq!(fields[19].split(',').count(), 2);
    }

    #[test]
    fn test_empty_vectors_and_missing_values() {
        assert_eq!(optional::<f64>(None), "-");
        assert_eq!(optional(Some(1.5)), "1.5");
        assert_eq!(joined::<u64>(&[]), "-");
        assert_eq!(joined(&[1, 2, 3]), "1,2,3");
    }
}
