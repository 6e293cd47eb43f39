//! Solution representation for the cash pickup and delivery problem.
//!
//! A solution owns one [`VehicleState`] per vehicle, the set of nodes nobody
//! serves, the running depot stock and the cost figures filled in by the
//! fitness evaluator.

use crate::error::{Result, SolverError};
use crate::fitness::Score;
use crate::instance::{ProblemInstance, DEPOT};
use crate::parameters::RoutingParameters;
use crate::vehicle::VehicleState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DISTANCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    vehicles: Vec<VehicleState>,
    unserved: BTreeSet<usize>,
    initial_stock: i64,
    depot_stock: i64,
    total_distance: f64,
    storage_cost: f64,
    fitness: f64,
    /// Scoring strategy that built this solution
    pub strategy: String,
    /// Construction time in seconds
    pub computation_time: f64,
}

impl Solution {
    /// Fresh solution: idle vehicles, every service node unserved, depot
    /// holding its initial stock.
    pub fn new(instance: &ProblemInstance, params: &RoutingParameters) -> Self {
        let vehicles = (0..params.vehicle_count)
            .map(|id| VehicleState::new(id, params.vehicle_capacity, params.vehicle_max_distance))
            .collect();
        let initial_stock = instance.initial_stock();

        Solution {
            vehicles,
            unserved: instance.service_ids().collect(),
            initial_stock,
            depot_stock: initial_stock,
            total_distance: 0.0,
            storage_cost: 0.0,
            fitness: f64::INFINITY,
            strategy: String::new(),
            computation_time: 0.0,
        }
    }

    /// Serve `node` with vehicle `vehicle`, updating every running total.
    pub fn insert(&mut self, instance: &ProblemInstance, vehicle: usize, node: usize) {
        let removed = self.unserved.remove(&node);
        debug_assert!(removed, "node {} is already served", node);
        let leg = self.vehicles[vehicle].serve(instance, node);
        self.total_distance += leg;
        self.depot_stock += instance.demand(node) as i64;
    }

    /// Send vehicle `vehicle` back to the depot.
    pub fn close_vehicle(&mut self, instance: &ProblemInstance, vehicle: usize) {
        self.total_distance += self.vehicles[vehicle].close(instance);
    }

    pub fn apply_score(&mut self, score: Score) {
        self.storage_cost = score.storage_cost;
        self.fitness = score.fitness;
    }

    pub fn vehicles(&self) -> &[VehicleState] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: usize) -> &VehicleState {
        &self.vehicles[id]
    }

    /// Route of each vehicle, depot left implicit.
    pub fn routes(&self) -> impl Iterator<Item = &[usize]> {
        self.vehicles.iter().map(|v| v.route())
    }

    pub fn unserved(&self) -> &BTreeSet<usize> {
        &self.unserved
    }

    pub fn served_count(&self) -> usize {
        self.vehicles.iter().map(|v| v.route().len()).sum()
    }

    /// Vehicles that left the depot
    pub fn used_vehicles(&self) -> usize {
        self.vehicles.iter().filter(|v| !v.is_empty()).count()
    }

    pub fn initial_stock(&self) -> i64 {
        self.initial_stock
    }

    pub fn depot_stock(&self) -> i64 {
        self.depot_stock
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn storage_cost(&self) -> f64 {
        self.storage_cost
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Total distance recomputed from the routes and the distance matrix.
    pub fn recompute_distance(&self, instance: &ProblemInstance) -> f64 {
        self.routes().map(|r| instance.route_length(r)).sum()
    }

    /// Check the routing invariants on a finished solution.
    pub fn validate(&self, instance: &ProblemInstance, params: &RoutingParameters) -> Result<()> {
        let fail = |msg: String| Err(SolverError::InvalidSolution(msg));

        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut stock = self.initial_stock;

        for vehicle in &self.vehicles {
            let mut used_capacity = 0i64;
            for &node in vehicle.route() {
                if node == DEPOT || node >= instance.dimension() {
                    return fail(format!("vehicle {} visits invalid node {}", vehicle.id, node));
                }
                if !seen.insert(node) {
                    return fail(format!("node {} is served more than once", node));
                }
                if self.unserved.contains(&node) {
                    return fail(format!("node {} is both served and unserved", node));
                }
                used_capacity += instance.demand(node).unsigned_abs() as i64;
                stock += instance.demand(node) as i64;
            }

            if vehicle.remaining_capacity() < 0 {
                return fail(format!("vehicle {} has negative remaining capacity", vehicle.id));
            }
            if vehicle.remaining_distance() < 0.0 {
                return fail(format!("vehicle {} has negative remaining distance", vehicle.id));
            }
            if params.vehicle_capacity as i64 - used_capacity != vehicle.remaining_capacity() as i64 {
                return fail(format!("vehicle {} capacity bookkeeping is off", vehicle.id));
            }
            let driven = instance.route_length(vehicle.route());
            if (params.vehicle_max_distance - driven - vehicle.remaining_distance()).abs() > DISTANCE_TOLERANCE {
                return fail(format!("vehicle {} distance bookkeeping is off", vehicle.id));
            }
        }

        let all: BTreeSet<usize> = instance.service_ids().collect();
        let covered: BTreeSet<usize> = seen.union(&self.unserved).copied().collect();
        if covered != all {
            return fail("served and unserved nodes do not cover all service nodes".to_string());
        }

        if stock != self.depot_stock {
            return fail(format!("depot stock is {} but routes imply {}", self.depot_stock, stock));
        }

        let recomputed = self.recompute_distance(instance);
        if (recomputed - self.total_distance).abs() > DISTANCE_TOLERANCE * recomputed.max(1.0) {
            return fail(format!(
                "total distance {} does not match the routes ({})",
                self.total_distance, recomputed
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.strategy)?;
        writeln!(f, "Routes per vehicle:")?;
        for vehicle in &self.vehicles {
            let stops: Vec<String> = vehicle.route().iter().map(|n| n.to_string()).collect();
            let path = if stops.is_empty() {
                "Depot".to_string()
            } else {
                format!("Depot -> {} -> Depot", stops.join(" -> "))
            };
            writeln!(
                f,
                "  Vehicle {}: {} | Remaining capacity: {} | Remaining distance: {:.2}",
                vehicle.id + 1,
                path,
                vehicle.remaining_capacity(),
                vehicle.remaining_distance()
            )?;
        }
        writeln!(f, "  Unserved: {:?}", self.unserved)?;
        writeln!(f, "  Total distance: {:.2}", self.total_distance)?;
        writeln!(f, "  Depot stock: {} (initial {})", self.depot_stock, self.initial_stock)?;
        writeln!(f, "  Storage cost: {:.2}", self.storage_cost)?;
        write!(f, "  Fitness: {:.2}", self.fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ProblemInstance, RoutingParameters) {
        let m = vec![
            vec![0.0, 10.0, 20.0, 30.0],
            vec![10.0, 0.0, 15.0, 25.0],
            vec![20.0, 15.0, 0.0, 12.0],
            vec![30.0, 25.0, 12.0, 0.0],
        ];
        let params = RoutingParameters {
            vehicle_count: 2,
            vehicle_capacity: 100,
            vehicle_max_distance: 1000.0,
            depot_max_stock: 1000,
            ..Default::default()
        };
        let instance = ProblemInstance::new("s", vec![0, 50, -30, 20], m, &params).unwrap();
        (instance, params)
    }

    #[test]
    fn test_new_solution() {
        let (instance, params) = setup();
        let sol = Solution::new(&instance, &params);
        assert_eq!(sol.vehicles().len(), 2);
        assert_eq!(sol.unserved().len(), 3);
        assert_eq!(sol.depot_stock(), 30);
        assert_eq!(sol.fitness(), f64::INFINITY);
        assert!(sol.validate(&instance, &params).is_ok());
    }

    #[test]
    fn test_insert_and_close() {
        let (instance, params) = setup();
        let mut sol = Solution::new(&instance, &params);
        sol.insert(&instance, 0, 1);
        sol.insert(&instance, 0, 2);
        sol.close_vehicle(&instance, 0);
        sol.close_vehicle(&instance, 1);

        assert_eq!(sol.vehicle(0).route(), &[1, 2]);
        assert_eq!(sol.unserved().iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(sol.depot_stock(), 30 + 50 - 30);
        // 0->1 10, 1->2 15, 2->0 20
        assert!((sol.total_distance() - 45.0).abs() < 1e-10);
        assert_eq!(sol.served_count(), 2);
        assert_eq!(sol.used_vehicles(), 1);
        assert!(sol.validate(&instance, &params).is_ok());
    }

    #[test]
    fn test_validate_catches_broken_totals() {
        let (instance, params) = setup();
        let mut sol = Solution::new(&instance, &params);
        sol.insert(&instance, 0, 3);
        sol.close_vehicle(&instance, 0);
        sol.total_distance += 1.0;
        assert!(matches!(
            sol.validate(&instance, &params),
            Err(SolverError::InvalidSolution(_))
        ));
    }

    #[test]
    fn test_display() {
        let (instance, params) = setup();
        let mut sol = Solution::new(&instance, &params);
        sol.insert(&instance, 1, 2);
        sol.close_vehicle(&instance, 1);
        let text = sol.to_string();
        assert!(text.contains("Vehicle 2: Depot -> 2 -> Depot"));
    }
}
