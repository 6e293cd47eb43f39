//! Greedy randomized construction of one complete solution.
//!
//! Vehicles are filled one after another. Each vehicle starts at the depot and
//! keeps taking the cheapest feasible unserved node, as ranked by the scoring
//! strategy, until nothing fits; then it returns to the depot and the next
//! vehicle starts.

use super::scoring::{Candidate, ScoringStrategy, StepContext};
use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;
use crate::random::RandomSource;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Whether depot stock limits which nodes are feasible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StockCheck {
    /// Stock overflow is only priced by the scoring and the storage cost
    #[default]
    Unchecked,
    /// A pickup must not push the depot stock above its limit
    Pickups,
}

pub struct SolutionBuilder<'a> {
    instance: &'a ProblemInstance,
    params: &'a RoutingParameters,
    strategy: &'a dyn ScoringStrategy,
    stock_check: StockCheck,
}

impl<'a> SolutionBuilder<'a> {
    pub fn new(
        instance: &'a ProblemInstance,
        params: &'a RoutingParameters,
        strategy: &'a dyn ScoringStrategy,
    ) -> Self {
        SolutionBuilder {
            instance,
            params,
            strategy,
            stock_check: StockCheck::default(),
        }
    }

    pub fn with_stock_check(mut self, stock_check: StockCheck) -> Self {
        self.stock_check = stock_check;
        self
    }

    pub fn strategy(&self) -> &dyn ScoringStrategy {
        self.strategy
    }

    fn stock_allows(&self, solution: &Solution, node: usize) -> bool {
        match self.stock_check {
            StockCheck::Unchecked => true,
            StockCheck::Pickups => {
                let demand = self.instance.demand(node) as i64;
                demand <= 0 || solution.depot_stock() + demand <= self.params.depot_max_stock
            }
        }
    }

    /// Unserved nodes the vehicle can still reach, in ascending node order.
    /// An empty result is the normal end of a route.
    pub fn feasible_candidates(&self, solution: &Solution, vehicle: usize) -> Vec<Candidate> {
        let state = solution.vehicle(vehicle);
        let here = state.position();
        solution
            .unserved()
            .iter()
            .copied()
            .filter(|&node| state.can_serve(self.instance, node))
            .filter(|&node| self.stock_allows(solution, node))
            .map(|node| Candidate {
                node,
                distance: self.instance.distance(here, node),
            })
            .collect()
    }

    /// Let the strategy rank the candidates and return its choice.
    pub fn select(
        &self,
        solution: &Solution,
        vehicle: usize,
        candidates: &[Candidate],
        rng: &mut RandomSource,
    ) -> Option<Candidate> {
        if candidates.is_empty() {
            return None;
        }

        let ctx = StepContext {
            instance: self.instance,
            params: self.params,
            vehicle: solution.vehicle(vehicle),
            depot_stock: solution.depot_stock(),
            unserved: solution.unserved(),
        };
        let weights = self.strategy.weights(&ctx, rng);

        self.strategy
            .pick(&ctx, &weights, candidates)
            .and_then(|i| candidates.get(i))
            .copied()
    }

    /// Build one complete solution. Fitness is left to the evaluator.
    pub fn build(&self, rng: &mut RandomSource) -> Solution {
        let start = Instant::now();
        let mut solution = Solution::new(self.instance, self.params);

        for vehicle in 0..self.params.vehicle_count {
            while !solution.unserved().is_empty() {
                let candidates = self.feasible_candidates(&solution, vehicle);
                if let Some(next) = self.select(&solution, vehicle, &candidates, rng) {
                    log::trace!(
                        "Vehicle {} -> node {} (leg {:.2}, {} candidates)",
                        vehicle,
                        next.node,
                        next.distance,
                        candidates.len()
                    );
                    solution.insert(self.instance, vehicle, next.node);
                } else {
                    break;
                }
            }
            solution.close_vehicle(self.instance, vehicle);
        }

        solution.strategy = self.strategy.name().to_string();
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }
}
