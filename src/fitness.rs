//! Fitness evaluation: travel cost, depot storage cost and coverage penalty.

use crate::solution::Solution;
use serde::{Deserialize, Serialize};

/// Cost coefficients of the objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Cost per unit of travelled distance
    pub distance_cost_factor: f64,
    /// Flat storage cost while the final stock fits the depot
    pub base_storage_cost: f64,
    /// Cost per unit of stock above the depot limit
    pub overflow_rate: f64,
    /// Cost per node left unserved; 0 disables the coverage term
    pub unserved_penalty: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            distance_cost_factor: 0.45,
            base_storage_cost: 10.0,
            overflow_rate: 100.0,
            unserved_penalty: 1000.0,
        }
    }
}

/// Cost figures of one solution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub storage_cost: f64,
    pub fitness: f64,
}

/// Pure function of a finished solution; lower fitness is better.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    model: CostModel,
    max_stock: i64,
}

impl FitnessEvaluator {
    pub fn new(model: CostModel, max_stock: i64) -> Self {
        FitnessEvaluator { model, max_stock }
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    pub fn storage_cost(&self, stock: i64) -> f64 {
        if stock <= self.max_stock {
            self.model.base_storage_cost
        } else {
            self.model.overflow_rate * (stock - self.max_stock) as f64
        }
    }

    pub fn distance_cost(&self, total_distance: f64) -> f64 {
        total_distance * self.model.distance_cost_factor
    }

    pub fn score(&self, solution: &Solution) -> Score {
        let storage_cost = self.storage_cost(solution.depot_stock());
        let coverage = self.model.unserved_penalty * solution.unserved().len() as f64;
        Score {
            storage_cost,
            fitness: self.distance_cost(solution.total_distance()) + storage_cost + coverage,
        }
    }

    /// Score `solution` and store the figures on it.
    pub fn evaluate(&self, solution: &mut Solution) -> Score {
        let score = self.score(solution);
        solution.apply_score(score);
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::ProblemInstance;
    use crate::parameters::RoutingParameters;

    #[test]
    fn test_storage_cost() {
        let eval = FitnessEvaluator::new(CostModel::default(), 100);
        assert_eq!(eval.storage_cost(0), 10.0);
        assert_eq!(eval.storage_cost(100), 10.0);
        assert_eq!(eval.storage_cost(103), 300.0);
    }

    #[test]
    fn test_score_is_idempotent() {
        let m = vec![
            vec![0.0, 10.0, 20.0],
            vec![10.0, 0.0, 15.0],
            vec![20.0, 15.0, 0.0],
        ];
        let params = RoutingParameters { vehicle_count: 1, vehicle_capacity: 100, ..Default::default() };
        let instance = ProblemInstance::new("f", vec![0, 30, 20], m, &params).unwrap();

        let mut sol = Solution::new(&instance, &params);
        sol.insert(&instance, 0, 1);
        sol.close_vehicle(&instance, 0);

        let eval = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);
        let first = eval.evaluate(&mut sol);
        let second = eval.evaluate(&mut sol);
        assert_eq!(first, second);

        // 20 distance * 0.45 + base 10 + one unserved node
        assert!((first.fitness - (9.0 + 10.0 + 1000.0)).abs() < 1e-10);
        assert_eq!(sol.fitness(), first.fitness);
        assert_eq!(sol.storage_cost(), 10.0);
    }

    #[test]
    fn test_no_coverage_term() {
        let model = CostModel { unserved_penalty: 0.0, ..Default::default() };
        let eval = FitnessEvaluator::new(model, 10);
        let m = vec![vec![0.0, 5.0], vec![5.0, 0.0]];
        let params = RoutingParameters { vehicle_count: 1, ..Default::default() };
        let instance = ProblemInstance::new("f", vec![0, 4], m, &params).unwrap();
        let sol = Solution::new(&instance, &params);
        assert_eq!(eval.score(&sol).fitness, 10.0);
    }
}
