//! Candidate scoring for the greedy builder.
//!
//! Every strategy turns a selection step into a set of [`FactorWeights`];
//! a candidate's cost is the weighted sum of its [`CandidateFactors`] and the
//! cheapest candidate is inserted next. Rule-based strategies such as
//! [`PickupPriority`] replace the weighted sum with their own ordering.

use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;
use crate::random::RandomSource;
use crate::vehicle::VehicleState;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Demand-priority factor of a zero-demand node: served last.
pub const ZERO_DEMAND_PRIORITY: f64 = 1.0e6;

/// A feasible next stop and the leg needed to reach it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub node: usize,
    pub distance: f64,
}

/// Read-only view of the construction at one selection step
pub struct StepContext<'a> {
    pub instance: &'a ProblemInstance,
    pub params: &'a RoutingParameters,
    pub vehicle: &'a VehicleState,
    pub depot_stock: i64,
    pub unserved: &'a BTreeSet<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub distance: f64,
    pub stock_penalty: f64,
    pub demand_priority: f64,
    pub proximity: f64,
    pub return_to_depot: f64,
}

impl FactorWeights {
    pub fn total(&self) -> f64 {
        self.distance + self.stock_penalty + self.demand_priority + self.proximity + self.return_to_depot
    }

    /// Scale the weights so they sum to 1. All-zero weights stay untouched.
    pub fn normalized(self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return self;
        }
        FactorWeights {
            distance: self.distance / total,
            stock_penalty: self.stock_penalty / total,
            demand_priority: self.demand_priority / total,
            proximity: self.proximity / total,
            return_to_depot: self.return_to_depot / total,
        }
    }
}

/// Raw factors of one candidate, all lower-is-better
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateFactors {
    /// Leg from the vehicle's position
    pub distance: f64,
    /// Stock above the depot limit after the visit
    pub stock_overflow: f64,
    /// Inverse of |demand|
    pub demand_priority: f64,
    /// Mean distance to the other unserved nodes
    pub proximity: f64,
    /// Leg again, priced by the return weight late in a route
    pub return_leg: f64,
}

impl CandidateFactors {
    pub fn compute(ctx: &StepContext<'_>, candidate: &Candidate) -> Self {
        let instance = ctx.instance;
        let node = candidate.node;
        let demand = instance.demand(node);

        let stock_after = ctx.depot_stock + demand as i64;
        let stock_overflow = (stock_after - ctx.params.depot_max_stock).max(0) as f64;

        let demand_priority = if demand == 0 {
            ZERO_DEMAND_PRIORITY
        } else {
            1.0 / demand.unsigned_abs() as f64
        };

        let (sum, count) = ctx
            .unserved
            .iter()
            .filter(|&&other| other != node)
            .fold((0.0, 0usize), |(sum, count), &other| (sum + instance.distance(node, other), count + 1));
        let proximity = if count == 0 { 0.0 } else { sum / count as f64 };

        CandidateFactors {
            distance: candidate.distance,
            stock_overflow,
            demand_priority,
            proximity,
            return_leg: candidate.distance,
        }
    }

    pub fn weighted(&self, weights: &FactorWeights) -> f64 {
        weights.distance * self.distance
            + weights.stock_penalty * self.stock_overflow
            + weights.demand_priority * self.demand_priority
            + weights.proximity * self.proximity
            + weights.return_to_depot * self.return_leg
    }
}

/// Pluggable candidate scoring used by the [`SolutionBuilder`](super::SolutionBuilder).
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Weights for one selection step. Called once per step, before any candidate is scored.
    fn weights(&self, ctx: &StepContext<'_>, rng: &mut RandomSource) -> FactorWeights;

    fn score(&self, ctx: &StepContext<'_>, weights: &FactorWeights, candidate: &Candidate) -> f64 {
        CandidateFactors::compute(ctx, candidate).weighted(weights)
    }

    /// Index of the candidate to insert: the lowest score, the earliest on ties.
    fn pick(&self, ctx: &StepContext<'_>, weights: &FactorWeights, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|&(_, c)| OrderedFloat(self.score(ctx, weights, c)))
            .map(|(i, _)| i)
    }
}

/// Sampling bounds of [`RandomizedWeights`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRanges {
    pub distance: (f64, f64),
    pub stock_penalty: (f64, f64),
    pub demand_priority: (f64, f64),
    pub proximity: (f64, f64),
    pub return_to_depot: (f64, f64),
    /// Used share of capacity and distance past which the return weight kicks in
    pub return_threshold: (f64, f64),
}

impl Default for WeightRanges {
    fn default() -> Self {
        WeightRanges {
            distance: (0.3, 0.8),
            stock_penalty: (0.3, 0.8),
            demand_priority: (0.1, 0.3),
            proximity: (0.3, 0.8),
            return_to_depot: (0.6, 0.8),
            return_threshold: (0.6, 0.8),
        }
    }
}

/// Multi-factor scoring with weights resampled at every step.
///
/// The return-to-depot weight is only drawn once the vehicle has used more
/// than a sampled share of both its capacity and its distance budget.
#[derive(Debug, Clone, Default)]
pub struct RandomizedWeights {
    pub ranges: WeightRanges,
}

impl RandomizedWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranges(ranges: WeightRanges) -> Self {
        RandomizedWeights { ranges }
    }
}

impl ScoringStrategy for RandomizedWeights {
    fn name(&self) -> &str {
        "RandomizedWeights"
    }

    fn weights(&self, ctx: &StepContext<'_>, rng: &mut RandomSource) -> FactorWeights {
        let r = &self.ranges;
        let mut weights = FactorWeights {
            distance: rng.float(r.distance.0, r.distance.1),
            stock_penalty: rng.float(r.stock_penalty.0, r.stock_penalty.1),
            demand_priority: rng.float(r.demand_priority.0, r.demand_priority.1),
            proximity: rng.float(r.proximity.0, r.proximity.1),
            return_to_depot: 0.0,
        };

        let threshold = rng.float(r.return_threshold.0, r.return_threshold.1);
        let capacity_used = ctx.vehicle.capacity_used_ratio(ctx.params.vehicle_capacity);
        let distance_used = ctx.vehicle.distance_used_ratio(ctx.params.vehicle_max_distance);
        if capacity_used > threshold && distance_used > threshold {
            weights.return_to_depot = rng.float(r.return_to_depot.0, r.return_to_depot.1);
        }

        weights.normalized()
    }
}

/// Plain nearest-neighbour choice
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFeasible;

impl ScoringStrategy for NearestFeasible {
    fn name(&self) -> &str {
        "NearestFeasible"
    }

    fn weights(&self, _ctx: &StepContext<'_>, _rng: &mut RandomSource) -> FactorWeights {
        FactorWeights { distance: 1.0, ..Default::default() }
    }

    fn score(&self, _ctx: &StepContext<'_>, _weights: &FactorWeights, candidate: &Candidate) -> f64 {
        candidate.distance
    }
}

/// Unweighted sum of distance, stock overflow, demand priority and proximity
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWeights;

impl ScoringStrategy for UnitWeights {
    fn name(&self) -> &str {
        "UnitWeights"
    }

    fn weights(&self, _ctx: &StepContext<'_>, _rng: &mut RandomSource) -> FactorWeights {
        FactorWeights {
            distance: 1.0,
            stock_penalty: 1.0,
            demand_priority: 1.0,
            proximity: 1.0,
            return_to_depot: 0.0,
        }
    }
}

/// Lexicographic rule: pickups first, then the smallest |demand|, then the
/// longest leg.
#[derive(Debug, Clone, Copy, Default)]
pub struct PickupPriority;

impl ScoringStrategy for PickupPriority {
    fn name(&self) -> &str {
        "PickupPriority"
    }

    fn weights(&self, _ctx: &StepContext<'_>, _rng: &mut RandomSource) -> FactorWeights {
        FactorWeights::default()
    }

    fn pick(&self, ctx: &StepContext<'_>, _weights: &FactorWeights, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|&(_, c)| {
                let demand = ctx.instance.demand(c.node);
                (demand < 0, demand.unsigned_abs(), Reverse(OrderedFloat(c.distance)))
            })
            .map(|(i, _)| i)
    }
}

/// Lexicographic rule: deliveries first, then the largest |demand|, then the
/// shortest leg.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryPriority;

impl ScoringStrategy for DeliveryPriority {
    fn name(&self) -> &str {
        "DeliveryPriority"
    }

    fn weights(&self, _ctx: &StepContext<'_>, _rng: &mut RandomSource) -> FactorWeights {
        FactorWeights::default()
    }

    fn pick(&self, ctx: &StepContext<'_>, _weights: &FactorWeights, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|&(_, c)| {
                let demand = ctx.instance.demand(c.node);
                (demand >= 0, Reverse(demand.unsigned_abs()), OrderedFloat(c.distance))
            })
            .map(|(i, _)| i)
    }
}

/// Strategy selector for configuration and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    Randomized,
    Nearest,
    Unit,
    PickupPriority,
    DeliveryPriority,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 5] {
        [
            StrategyKind::Randomized,
            StrategyKind::Nearest,
            StrategyKind::Unit,
            StrategyKind::PickupPriority,
            StrategyKind::DeliveryPriority,
        ]
    }

    pub fn build(&self) -> Box<dyn ScoringStrategy> {
        match self {
            StrategyKind::Randomized => Box::new(RandomizedWeights::new()),
            StrategyKind::Nearest => Box::new(NearestFeasible),
            StrategyKind::Unit => Box::new(UnitWeights),
            StrategyKind::PickupPriority => Box::new(PickupPriority),
            StrategyKind::DeliveryPriority => Box::new(DeliveryPriority),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.build().name())
    }
}
