//! Best-of-N search over independent randomized constructions.
//!
//! The controller moves through INIT -> {BUILD -> EVALUATE -> COMPARE}* ->
//! TERMINATED. Every iteration builds a fresh solution from the shared random
//! source; the incumbent is only replaced on strict improvement.

use super::builder::{SolutionBuilder, StockCheck};
use super::parallel::ParallelSearch;
use super::scoring::StrategyKind;
use crate::fitness::{CostModel, FitnessEvaluator};
use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;
use crate::random::RandomSource;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What happened in one BUILD -> EVALUATE -> COMPARE cycle
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    /// Fitness of the solution built in this iteration
    pub fitness: f64,
    /// Incumbent fitness after the comparison
    pub best_fitness: f64,
    pub improved: bool,
    pub build_time: Duration,
    /// Time since the search started
    pub elapsed: Duration,
}

/// Result of a finished search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Option<Solution>,
    pub iterations: usize,
    pub elapsed: Duration,
    /// Fitness of every built solution, in build order
    pub fitness_history: Vec<f64>,
    /// Incumbent fitness after every iteration
    pub best_history: Vec<f64>,
    /// Whether the wall-clock budget stopped the search before the iteration budget
    pub time_limited: bool,
}

impl SearchOutcome {
    pub fn best_fitness(&self) -> f64 {
        self.best.as_ref().map(|s| s.fitness()).unwrap_or(f64::INFINITY)
    }
}

pub struct SearchController<'a> {
    builder: SolutionBuilder<'a>,
    evaluator: FitnessEvaluator,
    rng: RandomSource,
    max_iterations: usize,
    time_budget: Duration,
    iteration: usize,
    start: Instant,
    best: Option<Solution>,
    best_fitness: f64,
    fitness_history: Vec<f64>,
    best_history: Vec<f64>,
}

impl<'a> SearchController<'a> {
    /// INIT: seed the random source once and start the clock.
    pub fn new(builder: SolutionBuilder<'a>, evaluator: FitnessEvaluator, params: &RoutingParameters) -> Self {
        SearchController {
            builder,
            evaluator,
            rng: RandomSource::new(params.random_seed),
            max_iterations: params.max_iterations,
            time_budget: params.time_budget(),
            iteration: 0,
            start: Instant::now(),
            best: None,
            best_fitness: f64::INFINITY,
            fitness_history: Vec::new(),
            best_history: Vec::new(),
        }
    }

    /// Replace the random source, e.g. with an independently seeded one per worker.
    pub fn with_random_source(mut self, rng: RandomSource) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_iteration_budget(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Measure the time budget from `start` instead of the controller's creation.
    pub fn with_start(mut self, start: Instant) -> Self {
        self.start = start;
        self
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Both budgets still allow another iteration. Checked between builds only.
    pub fn budget_left(&self) -> bool {
        self.iteration < self.max_iterations && self.start.elapsed() < self.time_budget
    }

    /// Run one BUILD -> EVALUATE -> COMPARE cycle; `None` once the search is terminated.
    pub fn step(&mut self) -> Option<IterationReport> {
        if !self.budget_left() {
            return None;
        }

        let build_start = Instant::now();
        let mut candidate = self.builder.build(&mut self.rng);
        let score = self.evaluator.evaluate(&mut candidate);
        let build_time = build_start.elapsed();

        let improved = score.fitness < self.best_fitness;
        if improved {
            log::debug!(
                "Iteration {} - new best fitness {:.2} ({} unserved)",
                self.iteration,
                score.fitness,
                candidate.unserved().len()
            );
            self.best_fitness = score.fitness;
            self.best = Some(candidate);
        }

        self.fitness_history.push(score.fitness);
        self.best_history.push(self.best_fitness);

        let report = IterationReport {
            iteration: self.iteration,
            fitness: score.fitness,
            best_fitness: self.best_fitness,
            improved,
            build_time,
            elapsed: self.start.elapsed(),
        };
        log::debug!(
            "Iteration {} - Fitness: {:.2}, Best fitness: {:.2}, Time: {:.4}s",
            report.iteration,
            report.fitness,
            report.best_fitness,
            build_time.as_secs_f64()
        );

        self.iteration += 1;
        Some(report)
    }

    pub fn run(self) -> SearchOutcome {
        self.run_with(|_| {})
    }

    /// Run until TERMINATED, handing every iteration report to `observer`.
    pub fn run_with<F: FnMut(&IterationReport)>(mut self, mut observer: F) -> SearchOutcome {
        log::info!(
            "Constructing solutions with {} (max {} iterations, {:.1}s)...",
            self.builder.strategy().name(),
            self.max_iterations,
            self.time_budget.as_secs_f64()
        );
        while let Some(report) = self.step() {
            observer(&report);
        }
        self.finish()
    }

    /// TERMINATED: hand out the incumbent.
    pub fn finish(self) -> SearchOutcome {
        let elapsed = self.start.elapsed();
        let time_limited = self.iteration < self.max_iterations;
        if time_limited {
            log::warn!(
                "Time budget exhausted after {} of {} iterations",
                self.iteration,
                self.max_iterations
            );
        }
        log::info!(
            "Search finished: {} iterations in {:.2}s, best fitness {:.2}",
            self.iteration,
            elapsed.as_secs_f64(),
            self.best_fitness
        );
        warn_unserved(self.best.as_ref());

        SearchOutcome {
            best: self.best,
            iterations: self.iteration,
            elapsed,
            fitness_history: self.fitness_history,
            best_history: self.best_history,
            time_limited,
        }
    }
}

pub(crate) fn warn_unserved(best: Option<&Solution>) {
    if let Some(best) = best {
        if !best.unserved().is_empty() {
            log::warn!("{} nodes left unserved: {:?}", best.unserved().len(), best.unserved());
        }
    }
}

/// Solver knobs that are not routing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    pub strategy: StrategyKind,
    pub stock_check: StockCheck,
    pub cost_model: CostModel,
    /// Number of parallel workers; 1 runs the sequential search
    pub workers: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            strategy: StrategyKind::default(),
            stock_check: StockCheck::default(),
            cost_model: CostModel::default(),
            workers: 1,
        }
    }
}

/// Run a complete search on `instance`.
pub fn solve(instance: &ProblemInstance, params: &RoutingParameters, options: &SolverOptions) -> SearchOutcome {
    let strategy = options.strategy.build();

    if options.workers > 1 {
        return ParallelSearch::new(instance, params, strategy.as_ref())
            .with_stock_check(options.stock_check)
            .with_cost_model(options.cost_model)
            .with_workers(options.workers)
            .run();
    }

    let builder = SolutionBuilder::new(instance, params, strategy.as_ref()).with_stock_check(options.stock_check);
    let evaluator = FitnessEvaluator::new(options.cost_model, params.depot_max_stock);
    SearchController::new(builder, evaluator, params).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::scoring::RandomizedWeights;

    fn setup() -> (ProblemInstance, RoutingParameters) {
        let params = RoutingParameters {
            vehicle_count: 3,
            vehicle_capacity: 1400,
            vehicle_max_distance: 250.0,
            depot_max_stock: 5000,
            max_iterations: 25,
            max_time_seconds: 60.0,
            random_seed: 2024,
        };
        let instance = ProblemInstance::random(20, &params, 3).unwrap();
        (instance, params)
    }

    #[test]
    fn test_best_fitness_never_increases() {
        let (instance, params) = setup();
        let strategy = RandomizedWeights::new();
        let builder = SolutionBuilder::new(&instance, &params, &strategy);
        let evaluator = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);

        let mut reports = Vec::new();
        let outcome = SearchController::new(builder, evaluator, &params).run_with(|r| reports.push(r.clone()));

        assert_eq!(outcome.iterations, 25);
        assert_eq!(reports.len(), 25);
        assert!(!outcome.time_limited);
        for pair in outcome.best_history.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        let min = outcome.fitness_history.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best_fitness(), min);
        assert!(reports[0].improved);
    }

    #[test]
    fn test_zero_iterations_has_no_best() {
        let (instance, params) = setup();
        let params = RoutingParameters { max_iterations: 0, ..params };
        let outcome = solve(&instance, &params, &SolverOptions::default());
        assert!(outcome.best.is_none());
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.best_fitness(), f64::INFINITY);
    }

    #[test]
    fn test_zero_time_budget_stops_immediately() {
        let (instance, params) = setup();
        let params = RoutingParameters { max_time_seconds: 0.0, ..params };
        let outcome = solve(&instance, &params, &SolverOptions::default());
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.time_limited);
    }

    #[test]
    fn test_step_by_step() {
        let (instance, params) = setup();
        let params = RoutingParameters { max_iterations: 2, ..params };
        let strategy = RandomizedWeights::new();
        let builder = SolutionBuilder::new(&instance, &params, &strategy);
        let evaluator = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);
        let mut controller = SearchController::new(builder, evaluator, &params);

        let first = controller.step().unwrap();
        assert_eq!(first.iteration, 0);
        assert_eq!(controller.best_fitness(), first.fitness);
        assert!(controller.step().is_some());
        assert!(controller.step().is_none());
        assert_eq!(controller.iteration(), 2);
    }

    #[test]
    fn test_shared_start_counts_against_budget() {
        let (instance, params) = setup();
        let params = RoutingParameters { max_time_seconds: 0.05, ..params };
        let strategy = RandomizedWeights::new();
        let builder = SolutionBuilder::new(&instance, &params, &strategy);
        let evaluator = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);

        let start = Instant::now() - Duration::from_millis(100);
        let mut controller = SearchController::new(builder, evaluator, &params).with_start(start);
        assert!(!controller.budget_left());
        assert!(controller.step().is_none());
    }
}
