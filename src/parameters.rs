//! Routing parameters: fleet, budgets and search limits.
//!
//! Parameters are read from a `;`-separated `Parameter;Value` file and can be
//! overridden from the command line. They are immutable once the search starts.

use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingParameters {
    /// Number of vehicles in the fleet
    pub vehicle_count: usize,
    /// Capacity of each vehicle, consumed by |demand| of every served node
    pub vehicle_capacity: i32,
    /// Distance budget of each vehicle, including the way back to the depot
    pub vehicle_max_distance: f64,
    /// Stock the depot can hold before storage overflow is charged
    pub depot_max_stock: i64,
    /// Maximum number of constructions tried by the search
    pub max_iterations: usize,
    /// Wall-clock budget of the search in seconds
    pub max_time_seconds: f64,
    pub random_seed: u64,
}

impl Default for RoutingParameters {
    fn default() -> Self {
        RoutingParameters {
            vehicle_count: 20,
            vehicle_capacity: 1000,
            vehicle_max_distance: 300.0,
            depot_max_stock: 5000,
            max_iterations: 100,
            max_time_seconds: 60.0,
            random_seed: 12345678,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParameterRow {
    #[serde(rename = "Parameter")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        SolverError::InvalidParameters(format!("cannot parse value '{}' for {}", value, name))
    })
}

impl RoutingParameters {
    /// Load parameters from a `Parameter;Value` CSV file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading parameters from {:?}", path.as_ref());
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse parameters from any reader. Keys not present keep their default value.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut params = RoutingParameters::default();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(reader);

        for row in rdr.deserialize() {
            let row: ParameterRow = row?;
            let value = row.value.as_str();
            match row.name.as_str() {
                "n_vehicles" => params.vehicle_count = parse_value(&row.name, value)?,
                "VEHICLE_CAPACITY" => params.vehicle_capacity = parse_value(&row.name, value)?,
                "MAX_DISTANCE" | "MAX_KM" => {
                    params.vehicle_max_distance = parse_value(&row.name, value)?
                }
                "MAX_STOCK" => params.depot_max_stock = parse_value(&row.name, value)?,
                "MAX_ITERATIONS" => params.max_iterations = parse_value(&row.name, value)?,
                "MAX_TIME" => params.max_time_seconds = parse_value(&row.name, value)?,
                "seed" => params.random_seed = parse_value(&row.name, value)?,
                other => log::debug!("Ignoring parameter {}", other),
            }
        }

        params.validate()?;
        Ok(params)
    }

    /// Reject parameter sets the solver cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.vehicle_capacity < 0 {
            return Err(SolverError::InvalidParameters(format!(
                "vehicle capacity must be non-negative, got {}",
                self.vehicle_capacity
            )));
        }
        if !self.vehicle_max_distance.is_finite() || self.vehicle_max_distance < 0.0 {
            return Err(SolverError::InvalidParameters(format!(
                "vehicle max distance must be a non-negative number, got {}",
                self.vehicle_max_distance
            )));
        }
        if self.depot_max_stock < 0 {
            return Err(SolverError::InvalidParameters(format!(
                "depot max stock must be non-negative, got {}",
                self.depot_max_stock
            )));
        }
        if !self.max_time_seconds.is_finite() || self.max_time_seconds < 0.0 {
            return Err(SolverError::InvalidParameters(format!(
                "time budget must be a non-negative number of seconds, got {}",
                self.max_time_seconds
            )));
        }
        Ok(())
    }

    /// Capacity of the whole fleet.
    pub fn fleet_capacity(&self) -> i64 {
        self.vehicle_capacity as i64 * self.vehicle_count as i64
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs_f64(self.max_time_seconds.max(0.0))
    }
}

impl std::fmt::Display for RoutingParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Parameters:")?;
        writeln!(f, "  Vehicles: {}", self.vehicle_count)?;
        writeln!(f, "  Vehicle capacity: {}", self.vehicle_capacity)?;
        writeln!(f, "  Vehicle max distance: {:.2}", self.vehicle_max_distance)?;
        writeln!(f, "  Depot max stock: {}", self.depot_max_stock)?;
        writeln!(f, "  Max iterations: {}", self.max_iterations)?;
        writeln!(f, "  Max time: {:.2}s", self.max_time_seconds)?;
        writeln!(f, "  Seed: {}", self.random_seed)
    }
}
