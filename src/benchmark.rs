//! Benchmarking module: scoring strategies × seeds on one or more instances.
//!
//! Every run is a complete search. Results are aggregated per strategy and
//! can be exported to CSV or printed as a text report.

use crate::error::Result;
use crate::fitness::CostModel;
use crate::heuristics::{solve, SolverOptions, StockCheck, StrategyKind};
use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Result of one search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: String,
    pub instance: String,
    pub dimension: usize,
    pub seed: u64,
    pub fitness: f64,
    pub total_distance: f64,
    pub storage_cost: f64,
    pub depot_stock: i64,
    pub served: usize,
    pub unserved: usize,
    pub used_vehicles: usize,
    pub iterations: usize,
    /// Wall-clock time of the whole search in seconds
    pub time: f64,
    /// Best solution passed post-validation
    pub valid: bool,
}

/// Aggregated statistics for a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStatistics {
    pub strategy: String,
    pub runs: usize,
    pub valid_runs: usize,
    pub mean_fitness: f64,
    pub median_fitness: f64,
    pub std_fitness: f64,
    pub best_fitness: f64,
    pub worst_fitness: f64,
    pub mean_unserved: f64,
    pub mean_time: f64,
    pub total_time: f64,
}

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub strategies: Vec<StrategyKind>,
    pub seeds: Vec<u64>,
    pub stock_check: StockCheck,
    pub cost_model: CostModel,
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            strategies: StrategyKind::all().to_vec(),
            seeds: (0..5).collect(),
            stock_check: StockCheck::default(),
            cost_model: CostModel::default(),
            workers: 1,
            show_progress: true,
        }
    }
}

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

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    /// Run every configured strategy with every seed on `instance`.
    /// The seed replaces `params.random_seed` for each run.
    pub fn run_on_instance(&mut self, instance: &ProblemInstance, params: &RoutingParameters) {
        log::info!("Running benchmark on instance: {}", instance.name());
        let total = (self.config.strategies.len() * self.config.seeds.len()) as u64;
        let bar = self.progress_bar(total);

        for &strategy in &self.config.strategies.clone() {
            for &seed in &self.config.seeds.clone() {
                bar.set_message(format!("{} seed {}", strategy, seed));
                let run_params = RoutingParameters {
                    random_seed: seed,
                    ..params.clone()
                };
                let options = SolverOptions {
                    strategy,
                    stock_check: self.config.stock_check,
                    cost_model: self.config.cost_model,
                    workers: self.config.workers,
                };
                let outcome = solve(instance, &run_params, &options);
                self.record(instance, &run_params, strategy, seed, &outcome);
                bar.inc(1);
            }
        }
        bar.finish_with_message(format!("{} done", instance.name()));
    }

    pub fn run_on_instances(&mut self, instances: &[ProblemInstance], params: &RoutingParameters) {
        for instance in instances {
            self.run_on_instance(instance, params);
        }
    }

    fn record(
        &mut self,
        instance: &ProblemInstance,
        params: &RoutingParameters,
        strategy: StrategyKind,
        seed: u64,
        outcome: &crate::heuristics::SearchOutcome,
    ) {
        let result = match &outcome.best {
            Some(best) => {
                let valid = match best.validate(instance, params) {
                    Ok(()) => true,
                    Err(e) => {
                        log::error!("{} seed {} produced an invalid solution: {}", strategy, seed, e);
                        false
                    }
                };
                RunResult {
                    strategy: strategy.to_string(),
                    instance: instance.name().to_string(),
                    dimension: instance.dimension(),
                    seed,
                    fitness: best.fitness(),
                    total_distance: best.total_distance(),
                    storage_cost: best.storage_cost(),
                    depot_stock: best.depot_stock(),
                    served: best.served_count(),
                    unserved: best.unserved().len(),
                    used_vehicles: best.used_vehicles(),
                    iterations: outcome.iterations,
                    time: outcome.elapsed.as_secs_f64(),
                    valid,
                }
            }
            None => RunResult {
                strategy: strategy.to_string(),
                instance: instance.name().to_string(),
                dimension: instance.dimension(),
                seed,
                fitness: f64::INFINITY,
                total_distance: 0.0,
                storage_cost: 0.0,
                depot_stock: instance.initial_stock(),
                served: 0,
                unserved: instance.dimension().saturating_sub(1),
                used_vehicles: 0,
                iterations: outcome.iterations,
                time: outcome.elapsed.as_secs_f64(),
                valid: false,
            },
        };
        self.results.push(result);
    }

    /// Statistics per strategy over valid runs, best mean fitness first.
    pub fn compute_statistics(&self) -> Vec<StrategyStatistics> {
        let mut by_strategy: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            by_strategy.entry(result.strategy.as_str()).or_default().push(result);
        }

        let mut statistics = Vec::new();
        for (strategy, runs) in by_strategy {
            let valid: Vec<&RunResult> = runs.iter().copied().filter(|r| r.valid).collect();
            if valid.is_empty() {
                continue;
            }

            let fitness: Vec<f64> = valid.iter().map(|r| r.fitness).collect();
            let unserved: Vec<f64> = valid.iter().map(|r| r.unserved as f64).collect();
            let times: Vec<f64> = valid.iter().map(|r| r.time).collect();

            let std_fitness = if fitness.len() > 1 {
                Statistics::std_dev(&fitness)
            } else {
                0.0
            };

            statistics.push(StrategyStatistics {
                strategy: strategy.to_string(),
                runs: runs.len(),
                valid_runs: valid.len(),
                mean_fitness: Statistics::mean(&fitness),
                median_fitness: Data::new(fitness.clone()).median(),
                std_fitness,
                best_fitness: fitness.iter().cloned().fold(f64::INFINITY, f64::min),
                worst_fitness: fitness.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                mean_unserved: Statistics::mean(&unserved),
                mean_time: Statistics::mean(&times),
                total_time: times.iter().sum(),
            });
        }

        statistics.sort_by(|a, b| a.mean_fitness.total_cmp(&b.mean_fitness));
        statistics
    }

    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
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
        report.push_str("     Cash PDP Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str("Strategy Performance Summary:\n");
        report.push_str("-".repeat(88).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>8} {:>12} {:>12} {:>12} {:>10} {:>10}\n",
            "Strategy", "Valid", "Mean Fit", "Best Fit", "Std Dev", "Unserved", "Avg Time"
        ));
        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<20} {:>8} {:>12.2} {:>12.2} {:>12.2} {:>10.2} {:>10.4}\n",
                stat.strategy,
                format!("{}/{}", stat.valid_runs, stat.runs),
                stat.mean_fitness,
                stat.best_fitness,
                stat.std_fitness,
                stat.mean_unserved,
                stat.mean_time
            ));
        }

        report.push_str("-".repeat(88).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");
        let mut instance_best: BTreeMap<&str, &RunResult> = BTreeMap::new();
        for result in self.results.iter().filter(|r| r.valid) {
            let entry = instance_best.entry(result.instance.as_str()).or_insert(result);
            if result.fitness < entry.fitness {
                *entry = result;
            }
        }
        for (instance, best) in &instance_best {
            report.push_str(&format!(
                "  {}: {:.2} ({}, seed {}, {} unserved)\n",
                instance, best.fitness, best.strategy, best.seed, best.unserved
            ));
        }

        report
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}
