//! Benchmarking and experimentation module.
//!
//! Runs the reactive GRASP several times per instance (one seed per run),
//! collects per-run results, aggregates them per instance and exports CSV
//! files and a text report.

use crate::heuristics::{GraspConfig, ReactiveGrasp, Solver};
use crate::instance::Instance;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Result of a single search run on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub instance: String,
    pub num_edges: usize,
    pub num_districts: usize,
    pub run: usize,
    pub seed: u64,
    /// Best value, absent when no feasible solution was found
    pub value: Option<f64>,
    pub feasible: bool,
    pub time: f64,
    pub iterations: u64,
    pub best_iteration: Option<u64>,
    pub best_time: Option<f64>,
    pub solutions_found: u64,
    pub constructed_feasible: u64,
    pub repaired_feasible: u64,
}

/// Aggregated statistics over the runs of one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    pub best_value: f64,
    pub worst_value: f64,
    pub avg_value: f64,
    pub std_value: f64,
    pub avg_time: f64,
    pub avg_iterations: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per instance
    pub num_runs: usize,
    /// Time limit per run in seconds
    pub time_limit: f64,
    /// Seed of the first run; run `i` uses `base_seed + i`
    pub base_seed: u64,
    pub alpha_count: usize,
    pub output_dir: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            time_limit: 60.0,
            base_seed: 0,
            alpha_count: 10,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BenchmarkConfig {
    fn grasp_config(&self, run: usize) -> GraspConfig {
        GraspConfig {
            time_limit: self.time_limit,
            seed: self.base_seed + run as u64,
            alpha_count: self.alpha_count,
            ..GraspConfig::default()
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Run every configured seed on one instance
    pub fn run_instance(&mut self, instance: &Instance) {
        log::info!("Running benchmark on instance: {}", instance.name);

        let progress = ProgressBar::new(self.config.num_runs as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg:>20} [{bar:30}] {pos}/{len} runs ({elapsed})")
                .map(|style| style.progress_chars("=> "))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(instance.name.clone());

        for run in 0..self.config.num_runs {
            let config = self.config.grasp_config(run);
            let seed = config.seed;
            let mut solver = ReactiveGrasp::new(config);
            let outcome = solver.solve(instance);
            let stats = outcome.statistics;

            self.results.push(RunResult {
                instance: instance.name.clone(),
                num_edges: instance.num_edges(),
                num_districts: instance.num_districts(),
                run,
                seed,
                value: stats.best_value,
                feasible: stats.is_feasible(),
                time: stats.elapsed,
                iterations: stats.iterations,
                best_iteration: stats.best_iteration,
                best_time: stats.best_time,
                solutions_found: stats.solutions_found,
                constructed_feasible: stats.constructed_feasible,
                repaired_feasible: stats.repaired_feasible,
            });
            progress.inc(1);
        }
        progress.finish();
    }

    /// Run the benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[Instance]) {
        for instance in instances {
            self.run_instance(instance);
        }
    }

    /// Aggregate results per instance (instances without feasible runs are skipped)
    pub fn compute_statistics(&self) -> Vec<InstanceSummary> {
        let mut by_instance: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            by_instance.entry(result.instance.as_str()).or_default().push(result);
        }

        by_instance.into_iter()
            .filter_map(|(name, runs)| {
                let values: Vec<f64> = runs.iter().filter_map(|r| r.value).collect();
                if values.is_empty() {
                    return None;
                }
                let times: Vec<f64> = runs.iter().map(|r| r.time).collect();
                let iterations: Vec<f64> = runs.iter().map(|r| r.iterations as f64).collect();
                let std_value = if values.len() > 1 { values.iter().std_dev() } else { 0.0 };
                Some(InstanceSummary {
                    instance: name.to_string(),
                    num_runs: runs.len(),
                    num_feasible: values.len(),
                    best_value: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    worst_value: values.iter().cloned().fold(f64::INFINITY, f64::min),
                    avg_value: values.iter().mean(),
                    std_value,
                    avg_time: times.iter().mean(),
                    avg_iterations: iterations.iter().mean(),
                })
            })
            .collect()
    }

    /// Export per-run results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export per-instance statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("    Edge Districting Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Runs per instance: {}  Time limit: {}s  Base seed: {}\n\n",
            self.config.num_runs, self.config.time_limit, self.config.base_seed
        ));

        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        report.push_str(&format!("{:<24} {:>10} {:>12} {:>12} {:>12} {:>8} {:>8}\n",
            "Instance", "Feasible", "Best", "Average", "Std", "Time", "Iters"));
        report.push_str("-".repeat(90).as_str());
        report.push('\n');

        for stat in &self.compute_statistics() {
            report.push_str(&format!("{:<24} {:>10} {:>12.2} {:>12.2} {:>12.2} {:>8.2} {:>8.0}\n",
                stat.instance,
                format!("{}/{}", stat.num_feasible, stat.num_runs),
                stat.best_value,
                stat.avg_value,
                stat.std_value,
                stat.avg_time,
                stat.avg_iterations));
        }

        let mut infeasible: Vec<&str> = self.results.iter()
            .map(|r| r.instance.as_str())
            .filter(|name| !self.results.iter().any(|r| r.instance == *name && r.feasible))
            .collect();
        infeasible.dedup();
        report.push_str("-".repeat(90).as_str());
        report.push('\n');
        if !infeasible.is_empty() {
            report.push_str(&format!("\nNo feasible solution found for: {}\n", infeasible.join(", ")));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }
}

/// Load every readable instance of a directory, smallest first. Files that
/// fail to parse are skipped with a warning.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<Instance>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read instance directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut instances = Vec::new();
    for path in paths {
        match Instance::from_file(&path) {
            Ok(instance) => instances.push(instance),
            Err(e) => log::warn!("skipping {}: {:#}", path.display(), e),
        }
    }

    instances.sort_by_key(|i| (i.num_edges(), OrderedFloat(i.capacity())));
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH_INSTANCE: &str = "2\n2\n0\n3 2\n0 0\n1 0\n2 0\n0 1 1\n1 2 1\n1 1\n1 1\n";

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_runs, 5);
        assert_eq!(config.grasp_config(3).seed, 3);
    }

    #[test]
    fn test_statistics_over_runs() {
        let mut instance = Instance::parse(PATH_INSTANCE).unwrap();
        instance.name = "path".to_string();
        let config = BenchmarkConfig {
            num_runs: 3,
            time_limit: 0.2,
            ..BenchmarkConfig::default()
        };
        let mut benchmark = Benchmark::new(config);
        benchmark.run_on_instances(std::slice::from_ref(&instance));

        assert_eq!(benchmark.results().len(), 3);
        let stats = benchmark.compute_statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].num_feasible, 3);
        assert!((stats[0].best_value - 2.0).abs() < 1e-9);
        assert!(stats[0].std_value.abs() < 1e-9);
        assert!(benchmark.generate_report().contains("path"));
    }

    #[test]
    fn test_load_instances_skips_bad_files() {
        let dir = std::env::temp_dir().join(format!("edge-districting-bench-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("path.txt"), PATH_INSTANCE).unwrap();
        std::fs::write(dir.join("broken.txt"), "not an instance").unwrap();

        let instances = load_instances_from_dir(&dir).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "path");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
