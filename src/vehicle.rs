//! Per-vehicle bookkeeping during construction.

use crate::instance::{ProblemInstance, DEPOT};
use serde::{Deserialize, Serialize};

/// Route and remaining budgets of one vehicle.
///
/// The depot is implicit at both ends of `route`. A vehicle only changes
/// through [`VehicleState::serve`] and is frozen by [`VehicleState::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: usize,
    route: Vec<usize>,
    remaining_capacity: i32,
    remaining_distance: f64,
    closed: bool,
}

impl VehicleState {
    pub fn new(id: usize, capacity: i32, max_distance: f64) -> Self {
        VehicleState {
            id,
            route: Vec::new(),
            remaining_capacity: capacity,
            remaining_distance: max_distance,
            closed: false,
        }
    }

    pub fn route(&self) -> &[usize] {
        &self.route
    }

    pub fn remaining_capacity(&self) -> i32 {
        self.remaining_capacity
    }

    pub fn remaining_distance(&self) -> f64 {
        self.remaining_distance
    }

    pub fn is_empty(&self) -> bool {
        self.route.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Node the vehicle currently stands at.
    pub fn position(&self) -> usize {
        self.route.last().copied().unwrap_or(DEPOT)
    }

    /// Whether the vehicle can go to `node` and still make it back to the depot.
    ///
    /// The distance test subtracts in the same order as `serve` then `close`,
    /// so an accepted node never leaves the budget below zero.
    pub fn can_serve(&self, instance: &ProblemInstance, node: usize) -> bool {
        if self.closed {
            return false;
        }
        let here = self.position();
        let demand = instance.demand(node).unsigned_abs() as i64;
        self.remaining_capacity as i64 >= demand
            && self.remaining_distance - instance.distance(here, node) - instance.distance(node, DEPOT) >= 0.0
    }

    /// Append `node` to the route and consume its budgets. Returns the travelled leg.
    ///
    /// Callers must check [`VehicleState::can_serve`] first.
    pub fn serve(&mut self, instance: &ProblemInstance, node: usize) -> f64 {
        debug_assert!(!self.closed, "vehicle {} is already back at the depot", self.id);
        let leg = instance.distance(self.position(), node);
        self.remaining_capacity -= instance.demand(node).abs();
        self.remaining_distance -= leg;
        self.route.push(node);
        leg
    }

    /// Drive back to the depot and freeze the vehicle. Returns the return leg,
    /// 0 for a vehicle that never left.
    pub fn close(&mut self, instance: &ProblemInstance) -> f64 {
        if self.closed {
            return 0.0;
        }
        self.closed = true;
        if self.route.is_empty() {
            return 0.0;
        }
        let leg = instance.distance(self.position(), DEPOT);
        self.remaining_distance -= leg;
        leg
    }

    /// Share of the capacity already consumed, in [0, 1] (0 for a zero budget).
    pub fn capacity_used_ratio(&self, capacity: i32) -> f64 {
        if capacity <= 0 {
            return 0.0;
        }
        (capacity - self.remaining_capacity) as f64 / capacity as f64
    }

    /// Share of the distance budget already consumed (0 for a zero budget).
    pub fn distance_used_ratio(&self, max_distance: f64) -> f64 {
        if max_distance <= 0.0 {
            return 0.0;
        }
        (max_distance - self.remaining_distance) / max_distance
    }
}
