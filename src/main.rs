//! Cash PDP Solver - Command Line Interface
//!
//! Multi-restart greedy solver for the cash pickup and delivery problem.

use cash_pdp_solver::benchmark::{Benchmark, BenchmarkConfig};
use cash_pdp_solver::export;
use cash_pdp_solver::fitness::CostModel;
use cash_pdp_solver::heuristics::{solve, SolverOptions, StockCheck, StrategyKind};
use cash_pdp_solver::instance::ProblemInstance;
use cash_pdp_solver::parameters::RoutingParameters;
use cash_pdp_solver::Result;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cash-pdp-solver")]
#[command(version = "1.0")]
#[command(about = "A multi-restart greedy solver for the cash pickup and delivery problem")]
struct Cli {
    /// Verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance given as demand and distance CSV files
    Solve {
        #[command(flatten)]
        input: InstanceFiles,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Candidate scoring strategy
        #[arg(long, value_enum, default_value = "randomized")]
        strategy: Strategy,

        /// Depot stock feasibility policy
        #[arg(long, value_enum, default_value = "unchecked")]
        stock_check: StockPolicy,

        /// Penalty per unserved node (0 disables the coverage term)
        #[arg(long, default_value = "1000")]
        unserved_penalty: f64,

        /// Number of parallel workers
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Base directory for the timestamped output folder
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Generate a random instance and write it as CSV files
    Generate {
        /// Number of service nodes (depot excluded)
        #[arg(short = 'n', long, default_value = "20")]
        services: usize,

        /// Generator seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Directory receiving demands.csv and distances.csv
        #[arg(short, long, default_value = "input_files")]
        output: PathBuf,
    },

    /// Analyze an instance
    Analyze {
        #[command(flatten)]
        input: InstanceFiles,

        #[command(flatten)]
        overrides: ParameterOverrides,
    },

    /// Compare scoring strategies over several seeds
    Benchmark {
        /// Demands CSV; random instances are generated when omitted
        #[arg(long, requires = "distances")]
        demands: Option<PathBuf>,

        /// Distance matrix CSV
        #[arg(long, requires = "demands")]
        distances: Option<PathBuf>,

        /// Sizes of generated instances
        #[arg(long, value_delimiter = ',', default_values_t = vec![10, 20, 50])]
        sizes: Vec<usize>,

        /// Number of seeds per strategy
        #[arg(short, long, default_value = "5")]
        runs: u64,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Number of parallel workers per run
        #[arg(short, long, default_value = "1")]
        workers: usize,

        /// Base directory for the timestamped output folder
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct InstanceFiles {
    /// Demands CSV (`node;demand`)
    #[arg(long)]
    demands: PathBuf,

    /// Headerless `;`-separated distance matrix
    #[arg(long)]
    distances: PathBuf,
}

#[derive(Args)]
struct ParameterOverrides {
    /// parameters.csv (`Parameter;Value`)
    #[arg(short, long)]
    params: Option<PathBuf>,

    #[arg(long)]
    vehicles: Option<usize>,

    #[arg(long)]
    capacity: Option<i32>,

    #[arg(long)]
    max_distance: Option<f64>,

    #[arg(long)]
    max_stock: Option<i64>,

    #[arg(long)]
    iterations: Option<usize>,

    /// Time limit in seconds
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Search seed
    #[arg(long)]
    search_seed: Option<u64>,
}

impl ParameterOverrides {
    fn resolve(&self) -> Result<RoutingParameters> {
        let mut params = match &self.params {
            Some(path) => RoutingParameters::from_file(path)?,
            None => RoutingParameters::default(),
        };
        if let Some(v) = self.vehicles {
            params.vehicle_count = v;
        }
        if let Some(v) = self.capacity {
            params.vehicle_capacity = v;
        }
        if let Some(v) = self.max_distance {
            params.vehicle_max_distance = v;
        }
        if let Some(v) = self.max_stock {
            params.depot_max_stock = v;
        }
        if let Some(v) = self.iterations {
            params.max_iterations = v;
        }
        if let Some(v) = self.time_limit {
            params.max_time_seconds = v;
        }
        if let Some(v) = self.search_seed {
            params.random_seed = v;
        }
        params.validate()?;
        Ok(params)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Strategy {
    /// Randomized weighted scoring
    Randomized,
    /// Nearest feasible node
    Nearest,
    /// All factors with weight 1
    Unit,
    /// Pickups first, smallest demand, longest leg
    PickupPriority,
    /// Deliveries first, largest demand, shortest leg
    DeliveryPriority,
}

impl From<Strategy> for StrategyKind {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Randomized => StrategyKind::Randomized,
            Strategy::Nearest => StrategyKind::Nearest,
            Strategy::Unit => StrategyKind::Unit,
            Strategy::PickupPriority => StrategyKind::PickupPriority,
            Strategy::DeliveryPriority => StrategyKind::DeliveryPriority,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum StockPolicy {
    /// Stock overflow is only priced
    Unchecked,
    /// Pickups may not overflow the depot
    Pickups,
}

impl From<StockPolicy> for StockCheck {
    fn from(p: StockPolicy) -> Self {
        match p {
            StockPolicy::Unchecked => StockCheck::Unchecked,
            StockPolicy::Pickups => StockCheck::Pickups,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = match cli.command {
        Commands::Solve { input, overrides, strategy, stock_check, unserved_penalty, workers, output } => {
            let options = SolverOptions {
                strategy: strategy.into(),
                stock_check: stock_check.into(),
                cost_model: CostModel {
                    unserved_penalty,
                    ..Default::default()
                },
                workers,
            };
            solve_instance(&input, &overrides, &options, &output, cli.verbose)
        }

        Commands::Generate { services, seed, overrides, output } => generate_instance(services, seed, &overrides, &output),

        Commands::Analyze { input, overrides } => analyze_instance(&input, &overrides),

        Commands::Benchmark { demands, distances, sizes, runs, overrides, workers, output } => {
            let files = demands.zip(distances);
            run_benchmark(files, &sizes, runs, &overrides, workers, &output)
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `<base>/<prefix>_<YYYYmmdd_HHMMSS>`, created on disk.
fn timestamped_dir(base: &Path, prefix: &str) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = base.join(format!("{}_{}", prefix, stamp));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn solve_instance(
    input: &InstanceFiles,
    overrides: &ParameterOverrides,
    options: &SolverOptions,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let params = overrides.resolve()?;
    let instance = ProblemInstance::from_csv(&input.demands, &input.distances, &params)?;

    if verbose {
        println!("{}", params);
        println!("{}", instance.statistics());
    }

    println!(
        "Solving {} with {} ({} workers)...",
        instance.name(),
        options.strategy,
        options.workers.max(1)
    );
    let outcome = solve(&instance, &params, options);

    let best = match &outcome.best {
        Some(best) => best,
        None => {
            println!("No solution was built (iteration or time budget is zero).");
            return Ok(());
        }
    };
    best.validate(&instance, &params)?;

    println!("\n========== Results ==========");
    println!("{}", best);
    println!("Served: {}/{}", best.served_count(), instance.dimension() - 1);
    println!("Vehicles used: {}/{}", best.used_vehicles(), params.vehicle_count);
    println!("Iterations: {}", outcome.iterations);
    println!("Time: {:.4}s", outcome.elapsed.as_secs_f64());

    println!("\nVehicle Metrics:");
    println!(
        "{:<8} {:>6} {:>9} {:>11} {:>10} {:>10} {:>12} {:>12}",
        "Vehicle", "Nodes", "Pick Ups", "Deliveries", "Load", "Avail", "Distance", "Avail Dist"
    );
    for m in export::vehicle_metrics(&instance, &params, best) {
        println!(
            "{:<8} {:>6} {:>9} {:>11} {:>10} {:>10} {:>12.2} {:>12.2}",
            m.vehicle,
            m.total_nodes,
            m.pick_ups,
            m.deliveries,
            m.used_capacity,
            m.available_capacity,
            m.used_distance,
            m.available_distance
        );
    }

    let dir = timestamped_dir(output, &format!("solution_{}", instance.name()))?;
    export::write_solution_json(dir.join("solution.json"), best)?;
    export::write_routes_csv(dir.join("routes.csv"), &instance, best)?;
    export::write_metrics_csv(dir.join("metrics.csv"), &instance, &params, best)?;
    export::write_history_csv(dir.join("history.csv"), &outcome)?;
    std::fs::write(dir.join("parameters.json"), serde_json::to_string_pretty(&params)?)?;
    log::info!("Results written to {:?}", dir);
    println!("\nResults saved to {:?}", dir);

    Ok(())
}

fn generate_instance(services: usize, seed: u64, overrides: &ParameterOverrides, output: &Path) -> Result<()> {
    let params = overrides.resolve()?;
    let instance = ProblemInstance::random(services, &params, seed)?;

    std::fs::create_dir_all(output)?;
    instance.write_csv(output.join("demands.csv"), output.join("distances.csv"))?;

    println!("{}", instance.statistics());
    println!("Instance written to {:?}", output);
    Ok(())
}

fn analyze_instance(input: &InstanceFiles, overrides: &ParameterOverrides) -> Result<()> {
    let params = overrides.resolve()?;
    let instance = ProblemInstance::from_csv(&input.demands, &input.distances, &params)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());
    println!("{}", params);

    let total = instance.total_demand();
    println!("Aggregate Demand:");
    println!("  Signed total: {}", total);
    println!(
        "  Fleet capacity: {} ({:.1}% used)",
        params.fleet_capacity(),
        100.0 * total as f64 / params.fleet_capacity().max(1) as f64
    );
    println!("  Final stock if everything is served: {}", instance.initial_stock() + total);
    println!("  Depot max stock: {}", params.depot_max_stock);

    let unreachable: Vec<usize> = instance
        .service_ids()
        .filter(|&n| 2.0 * instance.distance(0, n) > params.vehicle_max_distance)
        .collect();
    let too_heavy = instance.oversized_nodes(params.vehicle_capacity);
    if !unreachable.is_empty() {
        println!("\nNodes out of round-trip range: {:?}", unreachable);
    }
    if !too_heavy.is_empty() {
        println!("Nodes exceeding vehicle capacity: {:?}", too_heavy);
    }

    let nearest = solve(
        &instance,
        &RoutingParameters {
            max_iterations: 1,
            ..params.clone()
        },
        &SolverOptions {
            strategy: StrategyKind::Nearest,
            ..Default::default()
        },
    );
    if let Some(sol) = nearest.best {
        println!("\nQuick Solution Estimate:");
        println!(
            "  Nearest feasible: fitness {:.2}, distance {:.2}, {} unserved",
            sol.fitness(),
            sol.total_distance(),
            sol.unserved().len()
        );
    }

    Ok(())
}

fn run_benchmark(
    files: Option<(PathBuf, PathBuf)>,
    sizes: &[usize],
    runs: u64,
    overrides: &ParameterOverrides,
    workers: usize,
    output: &Path,
) -> Result<()> {
    let params = overrides.resolve()?;

    let instances = match files {
        Some((demands, distances)) => vec![ProblemInstance::from_csv(&demands, &distances, &params)?],
        None => {
            let mut generated = Vec::new();
            for (i, &size) in sizes.iter().enumerate() {
                match ProblemInstance::random(size, &params, params.random_seed.wrapping_add(i as u64)) {
                    Ok(instance) => generated.push(instance),
                    Err(e) => log::warn!("Skipping random instance of size {}: {}", size, e),
                }
            }
            generated
        }
    };

    println!("Benchmarking on {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(());
    }

    let config = BenchmarkConfig {
        seeds: (0..runs).collect(),
        workers,
        ..Default::default()
    };
    let mut benchmark = Benchmark::new(config);
    for (i, instance) in instances.iter().enumerate() {
        println!(
            "\n[{}/{}] Processing {} (n={})...",
            i + 1,
            instances.len(),
            instance.name(),
            instance.dimension()
        );
        benchmark.run_on_instance(instance, &params);
    }

    let dir = timestamped_dir(output, "benchmark")?;

    let results_path = dir.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = dir.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = dir.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}
