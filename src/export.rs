//! Route and vehicle-metric exports for a finished solution.

use crate::error::Result;
use crate::heuristics::SearchOutcome;
use crate::instance::ProblemInstance;
use crate::parameters::RoutingParameters;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Kind of stop on a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    #[serde(rename = "Pick_Up")]
    PickUp,
    Delivery,
    /// Zero demand: visited but neither picked up nor delivered
    #[serde(rename = "None")]
    NoDemand,
}

impl StopKind {
    pub fn of(demand: i32) -> Self {
        match demand {
            d if d > 0 => StopKind::PickUp,
            d if d < 0 => StopKind::Delivery,
            _ => StopKind::NoDemand,
        }
    }
}

/// One served node in the routes export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub vehicle: usize,
    pub position: usize,
    pub node: usize,
    #[serde(rename = "type")]
    pub kind: StopKind,
    pub demand: i32,
    /// Capacity consumed up to and including this stop
    pub load: i32,
    /// Distance travelled from the depot up to this stop
    pub distance: f64,
}

/// Usage figures of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMetrics {
    pub vehicle: usize,
    pub total_nodes: usize,
    pub pick_ups: usize,
    pub deliveries: usize,
    pub used_capacity: i32,
    pub available_capacity: i32,
    pub used_distance: f64,
    pub available_distance: f64,
}

/// Convergence trace of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub iteration: usize,
    pub fitness: f64,
    pub best_fitness: f64,
}

/// Stops of every route in vehicle order. Vehicles are numbered from 1.
pub fn route_stops(instance: &ProblemInstance, solution: &Solution) -> Vec<RouteStop> {
    let mut stops = Vec::new();
    for vehicle in solution.vehicles() {
        let mut load = 0;
        let mut distance = 0.0;
        let mut here = crate::instance::DEPOT;
        for (position, &node) in vehicle.route().iter().enumerate() {
            let demand = instance.demand(node);
            load += demand.unsigned_abs() as i32;
            distance += instance.distance(here, node);
            here = node;
            stops.push(RouteStop {
                vehicle: vehicle.id + 1,
                position: position + 1,
                node,
                kind: StopKind::of(demand),
                demand,
                load,
                distance,
            });
        }
    }
    stops
}

pub fn vehicle_metrics(
    instance: &ProblemInstance,
    params: &RoutingParameters,
    solution: &Solution,
) -> Vec<VehicleMetrics> {
    solution
        .vehicles()
        .iter()
        .map(|vehicle| {
            let route = vehicle.route();
            let count = |kind: StopKind| route.iter().filter(|&&n| StopKind::of(instance.demand(n)) == kind).count();
            VehicleMetrics {
                vehicle: vehicle.id + 1,
                total_nodes: route.len(),
                pick_ups: count(StopKind::PickUp),
                deliveries: count(StopKind::Delivery),
                used_capacity: params.vehicle_capacity - vehicle.remaining_capacity(),
                available_capacity: vehicle.remaining_capacity(),
                used_distance: params.vehicle_max_distance - vehicle.remaining_distance(),
                available_distance: vehicle.remaining_distance(),
            }
        })
        .collect()
}

pub fn write_routes_csv<P: AsRef<Path>>(path: P, instance: &ProblemInstance, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for stop in route_stops(instance, solution) {
        writer.serialize(stop)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_metrics_csv<P: AsRef<Path>>(
    path: P,
    instance: &ProblemInstance,
    params: &RoutingParameters,
    solution: &Solution,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for row in vehicle_metrics(instance, params, solution) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_history_csv<P: AsRef<Path>>(path: P, outcome: &SearchOutcome) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for (iteration, (&fitness, &best_fitness)) in outcome
        .fitness_history
        .iter()
        .zip(&outcome.best_history)
        .enumerate()
    {
        writer.serialize(HistoryRow {
            iteration,
            fitness,
            best_fitness,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_solution_json<P: AsRef<Path>>(path: P, solution: &Solution) -> Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer_pretty(&mut file, solution)?;
    file.write_all(b"\n")?;
    Ok(())
}
