//! Edge Districting Solver - Command Line Interface
//!
//! Reactive GRASP for the capacitated edge-districting problem.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edge_districting::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use edge_districting::heuristics::{
    ConstructionHeuristic, GraspConfig, ImprovementHeuristic, LocalSearch, ReactiveGrasp,
    SearchContext, SemiGreedyConstruction, SolutionFixer, Solver,
};
use edge_districting::instance::Instance;
use edge_districting::report::{append_statistics_line, write_json, StatisticsLine};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "edge-districting")]
#[command(version = "1.0")]
#[command(about = "Reactive GRASP solver for capacitated edge districting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance with the reactive GRASP
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// JSON file with a search configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of alpha values
        #[arg(long)]
        alpha_count: Option<usize>,

        /// Accepted solutions between probability updates
        #[arg(long)]
        reweight_period: Option<usize>,

        /// Stop after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Known dual bound, enables the gap stopping criterion
        #[arg(long)]
        dual_bound: Option<f64>,

        /// Disable local search
        #[arg(long)]
        no_local_search: bool,

        /// Write the best solution in the solution stream format
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON summary of the best solution and the search statistics
        #[arg(long)]
        json: Option<PathBuf>,

        /// Append the statistics line to this file
        #[arg(long)]
        statistics: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs per instance
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Seed of the first run
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Number of alpha values
        #[arg(long, default_value = "10")]
        alpha_count: usize,

        /// Maximum number of edges
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Seed of the quick construction
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            instance, config, time_limit, seed, alpha_count, reweight_period,
            max_iterations, dual_bound, no_local_search, output, json, statistics, verbose,
        } => {
            let mut grasp = match config {
                Some(path) => load_config(&path)?,
                None => GraspConfig::default(),
            };
            if let Some(t) = time_limit { grasp.time_limit = t; }
            if let Some(s) = seed { grasp.seed = s; }
            if let Some(n) = alpha_count { grasp.alpha_count = n; }
            if let Some(k) = reweight_period { grasp.reweight_period = k; }
            if max_iterations.is_some() { grasp.max_iterations = max_iterations; }
            if dual_bound.is_some() { grasp.dual_bound = dual_bound; }
            if no_local_search { grasp.local_search = false; }

            solve_instance(&instance, grasp, output, json, statistics, verbose)
        }

        Commands::Benchmark { dir, output, runs, time_limit, seed, alpha_count, max_size } => {
            let config = BenchmarkConfig {
                num_runs: runs,
                time_limit,
                base_seed: seed,
                alpha_count,
                output_dir: output,
            };
            run_benchmark(&dir, config, max_size)
        }

        Commands::Analyze { instance, seed } => analyze_instance(&instance, seed),
    }
}

fn load_config(path: &Path) -> Result<GraspConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid configuration {}", path.display()))
}

fn solve_instance(
    path: &Path,
    config: GraspConfig,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    statistics: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    println!("Loading instance from {:?}...", path);
    let instance = Instance::from_file(path)?;

    if verbose {
        println!("{}", instance.statistics());
        println!("Configuration: {:?}", config);
    }

    let mut solver = ReactiveGrasp::new(config.clone());
    println!("Solving with {}...", solver.name());
    let outcome = solver.solve(&instance);
    let stats = &outcome.statistics;

    println!("\n========== Results ==========");
    println!("Iterations: {}", stats.iterations);
    println!("Feasible solutions: {} ({} constructed, {} repaired)",
        stats.solutions_found, stats.constructed_feasible, stats.repaired_feasible);
    println!("Infeasible constructions: {:?}", stats.infeasibility);
    println!("Time: {:.4}s", stats.elapsed);

    match &outcome.best {
        Some(best) => {
            println!("Best value: {:.2}", best.value());
            println!("Found at iteration {} ({:.4}s)",
                stats.best_iteration.unwrap_or(0), stats.best_time.unwrap_or(0.0));
            if verbose {
                println!("\n{}", best);
                for alpha in &stats.alphas {
                    println!("  alpha {:.2}: p = {:.4}, {} samples, mean {:.2}",
                        alpha.alpha, alpha.probability, alpha.samples, alpha.mean_value);
                }
            }
        }
        None => println!("No feasible solution found"),
    }

    if let Some(out_path) = output {
        match &outcome.best {
            Some(best) => {
                best.write_to_file(&out_path)?;
                println!("\nSolution saved to {:?}", out_path);
            }
            None => log::warn!("no feasible solution to write to {}", out_path.display()),
        }
    }

    if let Some(json_path) = json {
        let report = serde_json::json!({
            "solution": outcome.best.as_ref().map(|s| s.summary()),
            "statistics": stats,
            "config": config,
        });
        write_json(&json_path, &report)?;
        println!("Summary saved to {:?}", json_path);
    }

    if let Some(stats_path) = statistics {
        let line = StatisticsLine::new(&instance, &config, stats);
        append_statistics_line(&stats_path, &line)?;
        println!("Statistics line appended to {:?}", stats_path);
    }

    Ok(())
}

fn run_benchmark(dir: &Path, config: BenchmarkConfig, max_size: Option<usize>) -> Result<()> {
    println!("Loading instances from {:?}...", dir);

    let mut instances = load_instances_from_dir(dir)?;
    if let Some(max) = max_size {
        instances.retain(|i| i.num_edges() <= max);
    }

    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    let output = config.output_dir.clone();
    std::fs::create_dir_all(&output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    let mut benchmark = Benchmark::new(config);
    for (i, instance) in instances.iter().enumerate() {
        println!("\n[{}/{}] Processing {} (|E|={}, m={})...",
            i + 1, instances.len(), instance.name, instance.num_edges(), instance.num_districts());
        benchmark.run_instance(instance);
    }

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)
        .with_context(|| format!("cannot write {}", report_path.display()))?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(path: &Path, seed: u64) -> Result<()> {
    let instance = Instance::from_file(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let bridges = instance.graph().non_leaf_bridges();
    let line = instance.line_graph_with_hub();
    println!("Non-leaf bridges: {}", bridges.len());
    println!("Line graph with hub: {} vertices, {} edges", line.num_vertices(), line.num_edges());

    let mut ctx = SearchContext::new(seed, 60.0);
    let constructed = SemiGreedyConstruction::new(0.5).construct(&instance, &mut ctx);
    let violations = constructed.violations();
    let repaired = SolutionFixer::new().improve(constructed.clone(), &mut ctx);
    let improved = if repaired.is_feasible() {
        LocalSearch::new().improve(repaired.clone(), &mut ctx)
    } else {
        repaired.clone()
    };

    println!("\nQuick Solution Estimates (alpha = 0.5):");
    println!("  Construction: {:.2} (violations: {:?})", constructed.value(), violations);
    println!("  Repaired: {:.2} (feasible: {})", repaired.value(), repaired.is_feasible());
    println!("  Local search: {:.2} (feasible: {})", improved.value(), improved.is_feasible());

    Ok(())
}
