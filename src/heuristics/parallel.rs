//! Parallel best-of-N search.
//!
//! Iterations are independent, so the iteration budget is split across rayon
//! workers. Worker `w` draws from its own source seeded with `seed + w` and
//! offers improvements to a shared incumbent behind a mutex. The incumbent is
//! ordered on (fitness, worker, iteration), which makes the final result
//! independent of thread scheduling whenever the time budget is not hit.
//! All workers share one clock, so a worker scheduled late only gets what is
//! left of the time budget.

use super::builder::{SolutionBuilder, StockCheck};
use super::scoring::ScoringStrategy;
use super::search::{warn_unserved, SearchController, SearchOutcome};
use crate::fitness::{CostModel, FitnessEvaluator};
use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;
use crate::random::RandomSource;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::sync::Mutex;
use std::time::Instant;

struct Incumbent {
    fitness: f64,
    worker: usize,
    iteration: usize,
    solution: Solution,
}

impl Incumbent {
    fn key(&self) -> (OrderedFloat<f64>, usize, usize) {
        (OrderedFloat(self.fitness), self.worker, self.iteration)
    }
}

/// Replace the shared incumbent if `candidate` ranks strictly before it.
fn offer(shared: &Mutex<Option<Incumbent>>, candidate: Incumbent) -> bool {
    let mut guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let better = match guard.as_ref() {
        None => true,
        Some(current) => candidate.key() < current.key(),
    };
    if better {
        *guard = Some(candidate);
    }
    better
}

/// Per-worker iteration quotas summing to `total`.
pub fn split_iterations(total: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let base = total / workers;
    let extra = total % workers;
    (0..workers).map(|w| base + usize::from(w < extra)).collect()
}

pub struct ParallelSearch<'a> {
    instance: &'a ProblemInstance,
    params: &'a RoutingParameters,
    strategy: &'a dyn ScoringStrategy,
    stock_check: StockCheck,
    cost_model: CostModel,
    workers: usize,
}

impl<'a> ParallelSearch<'a> {
    pub fn new(
        instance: &'a ProblemInstance,
        params: &'a RoutingParameters,
        strategy: &'a dyn ScoringStrategy,
    ) -> Self {
        ParallelSearch {
            instance,
            params,
            strategy,
            stock_check: StockCheck::default(),
            cost_model: CostModel::default(),
            workers: rayon::current_num_threads(),
        }
    }

    pub fn with_stock_check(mut self, stock_check: StockCheck) -> Self {
        self.stock_check = stock_check;
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run(&self) -> SearchOutcome {
        let start = Instant::now();
        let quotas = split_iterations(self.params.max_iterations, self.workers);
        let root = RandomSource::new(self.params.random_seed);
        let incumbent: Mutex<Option<Incumbent>> = Mutex::new(None);

        log::info!(
            "Constructing solutions with {} on {} workers (max {} iterations, {:.1}s)...",
            self.strategy.name(),
            quotas.len(),
            self.params.max_iterations,
            self.params.max_time_seconds
        );

        let per_worker: Vec<(usize, Vec<f64>)> = quotas
            .par_iter()
            .enumerate()
            .map(|(worker, &quota)| {
                let builder = SolutionBuilder::new(self.instance, self.params, self.strategy)
                    .with_stock_check(self.stock_check);
                let evaluator = FitnessEvaluator::new(self.cost_model, self.params.depot_max_stock);
                let mut controller = SearchController::new(builder, evaluator, self.params)
                    .with_random_source(root.fork(worker as u64))
                    .with_iteration_budget(quota)
                    .with_start(start);

                let mut history = Vec::with_capacity(quota.min(1 << 12));
                while let Some(report) = controller.step() {
                    history.push(report.fitness);
                    if report.improved {
                        if let Some(best) = controller.best() {
                            let accepted = offer(
                                &incumbent,
                                Incumbent {
                                    fitness: report.fitness,
                                    worker,
                                    iteration: report.iteration,
                                    solution: best.clone(),
                                },
                            );
                            if accepted {
                                log::debug!(
                                    "Worker {} iteration {} - new global best {:.2}",
                                    worker,
                                    report.iteration,
                                    report.fitness
                                );
                            }
                        }
                    }
                }
                (controller.iteration(), history)
            })
            .collect();

        let iterations: usize = per_worker.iter().map(|(done, _)| done).sum();
        let fitness_history: Vec<f64> = per_worker.into_iter().flat_map(|(_, h)| h).collect();
        let best_history: Vec<f64> = fitness_history
            .iter()
            .scan(f64::INFINITY, |best, &f| {
                *best = best.min(f);
                Some(*best)
            })
            .collect();

        let best = incumbent
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .map(|inc| inc.solution);
        let elapsed = start.elapsed();
        let time_limited = iterations < self.params.max_iterations;
        if time_limited {
            log::warn!(
                "Time budget exhausted after {} of {} iterations",
                iterations,
                self.params.max_iterations
            );
        }
        log::info!(
            "Parallel search finished: {} iterations in {:.2}s, best fitness {:.2}",
            iterations,
            elapsed.as_secs_f64(),
            best.as_ref().map(|s| s.fitness()).unwrap_or(f64::INFINITY)
        );
        warn_unserved(best.as_ref());

        SearchOutcome {
            best,
            iterations,
            elapsed,
            fitness_history,
            best_history,
            time_limited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::scoring::RandomizedWeights;
    use crate::heuristics::search::{solve, SolverOptions};

    fn setup() -> (ProblemInstance, RoutingParameters) {
        let params = RoutingParameters {
            vehicle_count: 3,
            vehicle_capacity: 1400,
            vehicle_max_distance: 250.0,
            depot_max_stock: 5000,
            max_iterations: 30,
            max_time_seconds: 60.0,
            random_seed: 99,
        };
        let instance = ProblemInstance::random(15, &params, 8).unwrap();
        (instance, params)
    }

    #[test]
    fn test_split_iterations() {
        assert_eq!(split_iterations(10, 3), vec![4, 3, 3]);
        assert_eq!(split_iterations(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_iterations(5, 0), vec![5]);
    }

    #[test]
    fn test_parallel_is_deterministic() {
        let (instance, params) = setup();
        let strategy = RandomizedWeights::new();
        let a = ParallelSearch::new(&instance, &params, &strategy).with_workers(4).run();
        let b = ParallelSearch::new(&instance, &params, &strategy).with_workers(4).run();

        assert_eq!(a.iterations, 30);
        assert_eq!(a.fitness_history, b.fitness_history);
        let routes_a: Vec<Vec<usize>> = a.best.as_ref().unwrap().routes().map(|r| r.to_vec()).collect();
        let routes_b: Vec<Vec<usize>> = b.best.as_ref().unwrap().routes().map(|r| r.to_vec()).collect();
        assert_eq!(routes_a, routes_b);
    }

    #[test]
    fn test_best_is_minimum_of_all_workers() {
        let (instance, params) = setup();
        let strategy = RandomizedWeights::new();
        let outcome = ParallelSearch::new(&instance, &params, &strategy).with_workers(3).run();
        let min = outcome.fitness_history.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best_fitness(), min);
        assert!(outcome.best.unwrap().validate(&instance, &params).is_ok());
    }

    #[test]
    fn test_single_worker_matches_sequential() {
        let (instance, params) = setup();
        let strategy = RandomizedWeights::new();
        let parallel = ParallelSearch::new(&instance, &params, &strategy).with_workers(1).run();
        let sequential = solve(&instance, &params, &SolverOptions::default());
        assert_eq!(parallel.fitness_history, sequential.fitness_history);
        assert_eq!(parallel.best_fitness(), sequential.best_fitness());
    }

    #[test]
    fn test_time_budget_is_shared_across_workers() {
        let (instance, params) = setup();
        let params = RoutingParameters {
            max_iterations: 10_000_000,
            max_time_seconds: 0.2,
            ..params
        };
        let strategy = RandomizedWeights::new();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();

        let outcome = pool.install(|| ParallelSearch::new(&instance, &params, &strategy).with_workers(4).run());

        assert!(outcome.time_limited);
        assert!(outcome.iterations > 0);
        // four sequential workers with their own clocks would take 0.8s
        assert!(outcome.elapsed < std::time::Duration::from_millis(600), "took {:?}", outcome.elapsed);
    }
}
