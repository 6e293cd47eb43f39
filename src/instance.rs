//! Module for loading and representing cash pickup-and-delivery instances.
//!
//! An instance is a depot (node 0) plus service nodes, each with a signed demand,
//! and a precomputed distance matrix. Instances are validated once on construction
//! and never change afterwards.

use crate::error::{Infeasibility, Result, SolverError};
use crate::parameters::RoutingParameters;
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// The depot is always node 0.
pub const DEPOT: usize = 0;

/// Represents a node of the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier, 0 is the depot
    pub id: usize,
    /// Demand: positive = pickup (adds to vehicle load and depot stock),
    /// negative = delivery (removes from both), 0 for the depot.
    pub demand: i32,
}

impl Node {
    pub fn new(id: usize, demand: i32) -> Self {
        Node { id, demand }
    }

    pub fn is_pickup(&self) -> bool {
        self.demand > 0
    }

    pub fn is_delivery(&self) -> bool {
        self.demand < 0
    }

    pub fn is_depot(&self) -> bool {
        self.id == DEPOT
    }
}

/// A validated, immutable problem instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemInstance {
    name: String,
    nodes: Vec<Node>,
    distance_matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DemandRow {
    node: usize,
    demand: i32,
}

impl ProblemInstance {
    /// Build an instance from a demand vector (index = node id) and a square
    /// distance matrix, checking it against the fleet and depot limits.
    pub fn new(
        name: &str,
        demands: Vec<i32>,
        distance_matrix: Vec<Vec<f64>>,
        params: &RoutingParameters,
    ) -> Result<Self> {
        let n = demands.len();
        if n == 0 {
            return Err(SolverError::InvalidInstance("instance has no depot".to_string()));
        }
        if demands[DEPOT] != 0 {
            return Err(SolverError::InvalidInstance(format!(
                "depot demand must be 0, got {}",
                demands[DEPOT]
            )));
        }
        if distance_matrix.len() != n {
            return Err(SolverError::InvalidInstance(format!(
                "distance matrix has {} rows for {} nodes",
                distance_matrix.len(),
                n
            )));
        }
        for (i, row) in distance_matrix.iter().enumerate() {
            if row.len() != n {
                return Err(SolverError::InvalidInstance(format!(
                    "distance matrix row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, &d) in row.iter().enumerate() {
                if !d.is_finite() || d < 0.0 {
                    return Err(SolverError::InvalidInstance(format!(
                        "distance ({}, {}) must be a non-negative number, got {}",
                        i, j, d
                    )));
                }
            }
            if row[i] != 0.0 {
                return Err(SolverError::InvalidInstance(format!(
                    "distance ({}, {}) on the diagonal must be 0, got {}",
                    i, i, row[i]
                )));
            }
        }

        let nodes = demands
            .into_iter()
            .enumerate()
            .map(|(id, demand)| Node::new(id, demand))
            .collect();

        let instance = ProblemInstance {
            name: name.to_string(),
            nodes,
            distance_matrix,
        };
        instance.check_aggregate_demand(params)?;
        Ok(instance)
    }

    /// Aggregate demand must fit both the fleet and the depot.
    fn check_aggregate_demand(&self, params: &RoutingParameters) -> Result<()> {
        let total_demand = self.total_demand();

        let fleet_capacity = params.fleet_capacity();
        if total_demand > fleet_capacity {
            return Err(SolverError::InstanceInfeasible(Infeasibility::ExceedsFleetCapacity {
                total_demand,
                fleet_capacity,
            }));
        }

        if total_demand > params.depot_max_stock {
            return Err(SolverError::InstanceInfeasible(Infeasibility::ExceedsMaxStock {
                total_demand,
                max_stock: params.depot_max_stock,
            }));
        }

        Ok(())
    }

    /// Load an instance from a `node;demand` file and a headerless `;`-separated
    /// distance matrix file.
    pub fn from_csv<P: AsRef<Path>, Q: AsRef<Path>>(
        demands_path: P,
        distances_path: Q,
        params: &RoutingParameters,
    ) -> Result<Self> {
        log::info!(
            "Loading instance from {:?} and {:?}",
            demands_path.as_ref(),
            distances_path.as_ref()
        );

        let mut rows: Vec<DemandRow> = Vec::new();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(File::open(&demands_path)?);
        for row in rdr.deserialize() {
            rows.push(row?);
        }
        rows.sort_by_key(|r| r.node);
        for (expected, row) in rows.iter().enumerate() {
            if row.node != expected {
                return Err(SolverError::InvalidInstance(format!(
                    "node ids must be contiguous from 0, missing node {}",
                    expected
                )));
            }
        }
        let demands: Vec<i32> = rows.into_iter().map(|r| r.demand).collect();

        let mut matrix: Vec<Vec<f64>> = Vec::new();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(File::open(&distances_path)?);
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| {
                        SolverError::InvalidInstance(format!("invalid distance '{}'", field))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            matrix.push(row);
        }

        let name = demands_path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "instance".to_string());

        Self::new(&name, demands, matrix, params)
    }

    /// Write the instance in the layout read by [`ProblemInstance::from_csv`].
    pub fn write_csv<P: AsRef<Path>, Q: AsRef<Path>>(&self, demands_path: P, distances_path: Q) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(File::create(&demands_path)?);
        for node in &self.nodes {
            wtr.serialize(DemandRow {
                node: node.id,
                demand: node.demand,
            })?;
        }
        wtr.flush()?;

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(File::create(&distances_path)?);
        for row in &self.distance_matrix {
            wtr.write_record(row.iter().map(|d| d.to_string()))?;
        }
        wtr.flush()?;

        log::info!(
            "Instance {} written to {:?} and {:?}",
            self.name,
            demands_path.as_ref(),
            distances_path.as_ref()
        );
        Ok(())
    }

    /// Generate a synthetic instance: demands uniform in [-200, 200), integer
    /// distances uniform in [5, 100), zero diagonal.
    pub fn random(n_services: usize, params: &RoutingParameters, seed: u64) -> Result<Self> {
        let mut rng = RandomSource::new(seed);
        let n = n_services + 1;

        let mut demands = Vec::with_capacity(n);
        demands.push(0);
        for _ in 0..n_services {
            demands.push(rng.int(-200, 199) as i32);
        }

        let mut matrix = vec![vec![0.0; n]; n];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    *cell = rng.int(5, 99) as f64;
                }
            }
        }

        Self::new(&format!("random-{}-{}", n_services, seed), demands, matrix, params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes including the depot
    pub fn dimension(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All node ids in ascending order, depot first.
    pub fn node_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Service node ids (everything but the depot).
    pub fn service_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.node_ids().filter(|&id| id != DEPOT)
    }

    #[inline]
    pub fn demand(&self, node: usize) -> i32 {
        self.nodes[node].demand
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    /// Signed sum of all demands.
    pub fn total_demand(&self) -> i64 {
        self.nodes.iter().map(|n| n.demand as i64).sum()
    }

    /// Stock held at the depot before any route starts: exactly what the
    /// deliveries need.
    pub fn initial_stock(&self) -> i64 {
        self.nodes
            .iter()
            .filter(|n| n.is_delivery())
            .map(|n| -(n.demand as i64))
            .sum()
    }

    /// Service nodes whose |demand| no single vehicle of `capacity` can carry.
    pub fn oversized_nodes(&self, capacity: i32) -> Vec<usize> {
        self.service_ids()
            .filter(|&n| i64::from(self.demand(n).unsigned_abs()) > i64::from(capacity))
            .collect()
    }

    /// Length of a closed route depot -> route... -> depot. Empty routes cost nothing.
    pub fn route_length(&self, route: &[usize]) -> f64 {
        if route.is_empty() {
            return 0.0;
        }
        let mut length = self.distance(DEPOT, route[0]);
        for pair in route.windows(2) {
            length += self.distance(pair[0], pair[1]);
        }
        length + self.distance(route[route.len() - 1], DEPOT)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let services = || self.nodes.iter().filter(|n| !n.is_depot());

        let num_pickups = services().filter(|n| n.is_pickup()).count();
        let num_deliveries = services().filter(|n| n.is_delivery()).count();
        let num_neutral = services().filter(|n| n.demand == 0).count();
        let total_pickup: i64 = services()
            .filter(|n| n.is_pickup())
            .map(|n| n.demand as i64)
            .sum();
        let total_delivery: i64 = services()
            .filter(|n| n.is_delivery())
            .map(|n| -(n.demand as i64))
            .sum();

        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension() {
            for j in 0..self.dimension() {
                if i != j {
                    distances.push(self.distance(i, j));
                }
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension(),
            num_pickups,
            num_deliveries,
            num_neutral,
            total_pickup,
            total_delivery,
            initial_stock: self.initial_stock(),
            avg_distance,
            max_distance,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub num_pickups: usize,
    pub num_deliveries: usize,
    pub num_neutral: usize,
    pub total_pickup: i64,
    pub total_delivery: i64,
    pub initial_stock: i64,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} (1 depot + {} services)", self.dimension, self.dimension - 1)?;
        writeln!(f, "  Pickup nodes: {}", self.num_pickups)?;
        writeln!(f, "  Delivery nodes: {}", self.num_deliveries)?;
        writeln!(f, "  Zero-demand nodes: {}", self.num_neutral)?;
        writeln!(f, "  Total pickup volume: {}", self.total_pickup)?;
        writeln!(f, "  Total delivery volume: {}", self.total_delivery)?;
        writeln!(f, "  Initial depot stock: {}", self.initial_stock)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn matrix(n: usize) -> Vec<Vec<f64>> {
        let mut m = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    m[i][j] = (i as f64 - j as f64).abs() * 10.0;
                }
            }
        }
        m
    }

    fn params() -> RoutingParameters {
        RoutingParameters {
            vehicle_count: 1,
            vehicle_capacity: 100,
            depot_max_stock: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn test_node_types() {
        let pickup = Node::new(1, 5);
        let delivery = Node::new(2, -5);
        let depot = Node::new(0, 0);

        assert!(pickup.is_pickup());
        assert!(!pickup.is_delivery());
        assert!(delivery.is_delivery());
        assert!(!delivery.is_pickup());
        assert!(depot.is_depot());
    }

    #[test]
    fn test_new_instance() {
        let instance = ProblemInstance::new("t", vec![0, 50, -30, 20], matrix(4), &params()).unwrap();
        assert_eq!(instance.dimension(), 4);
        assert_eq!(instance.service_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(instance.total_demand(), 40);
        assert_eq!(instance.initial_stock(), 30);
        assert!((instance.distance(1, 3) - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_exceeds_fleet_capacity() {
        let err = ProblemInstance::new("t", vec![0, 80, 40], matrix(3), &params()).unwrap_err();
        assert!(matches!(
            err,
            SolverError::InstanceInfeasible(Infeasibility::ExceedsFleetCapacity { total_demand: 120, .. })
        ));
    }

    #[test]
    fn test_oversized_nodes() {
        let instance = ProblemInstance::new("t", vec![0, 40, -150, 120], matrix(4), &params()).unwrap();
        assert_eq!(instance.oversized_nodes(100), vec![2, 3]);

        let extreme = ProblemInstance::new("t", vec![0, i32::MIN, 5], matrix(3), &params()).unwrap();
        assert_eq!(extreme.oversized_nodes(i32::MAX), vec![1]);
    }

    #[test]
    fn test_exceeds_max_stock() {
        let p = RoutingParameters { depot_max_stock: 50, ..params() };
        let err = ProblemInstance::new("t", vec![0, 40, 20], matrix(3), &p).unwrap_err();
        assert!(matches!(
            err,
            SolverError::InstanceInfeasible(Infeasibility::ExceedsMaxStock { max_stock: 50, .. })
        ));
    }

    #[test]
    fn test_malformed_instances() {
        assert!(matches!(
            ProblemInstance::new("t", vec![5, 1], matrix(2), &params()),
            Err(SolverError::InvalidInstance(_))
        ));
        assert!(matches!(
            ProblemInstance::new("t", vec![0, 1, 2], matrix(2), &params()),
            Err(SolverError::InvalidInstance(_))
        ));
        let mut m = matrix(3);
        m[1][2] = -1.0;
        assert!(matches!(
            ProblemInstance::new("t", vec![0, 1, 2], m, &params()),
            Err(SolverError::InvalidInstance(_))
        ));
        let mut m = matrix(3);
        m[2][2] = 3.0;
        assert!(matches!(
            ProblemInstance::new("t", vec![0, 1, 2], m, &params()),
            Err(SolverError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_route_length() {
        let instance = ProblemInstance::new("t", vec![0, 50, -30, 20], matrix(4), &params()).unwrap();
        assert_eq!(instance.route_length(&[]), 0.0);
        // 0->1 (10) + 1->3 (20) + 3->0 (30)
        assert!((instance.route_length(&[1, 3]) - 60.0).abs() < 1e-10);
    }

    #[test]
    fn test_random_instance_is_reproducible() {
        let p = RoutingParameters { depot_max_stock: 1_000_000, vehicle_capacity: 100_000, ..params() };
        let a = ProblemInstance::random(15, &p, 5).unwrap();
        let b = ProblemInstance::random(15, &p, 5).unwrap();
        assert_eq!(a.dimension(), 16);
        assert_eq!(a.nodes(), b.nodes());
        for i in 0..a.dimension() {
            assert_eq!(a.distance(i, i), 0.0);
            for j in 0..a.dimension() {
                assert_eq!(a.distance(i, j), b.distance(i, j));
            }
        }
        assert!(a.service_ids().all(|id| (-200..200).contains(&a.demand(id))));
    }

    #[test]
    fn test_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let demands_path = dir.path().join("demands.csv");
        let distances_path = dir.path().join("distances.csv");

        let mut f = File::create(&demands_path).unwrap();
        writeln!(f, "node;demand\n0;0\n2;-30\n1;50").unwrap();
        let mut f = File::create(&distances_path).unwrap();
        writeln!(f, "0;10;20\n10;0;15\n20;15;0").unwrap();

        let instance = ProblemInstance::from_csv(&demands_path, &distances_path, &params()).unwrap();
        assert_eq!(instance.name(), "demands");
        assert_eq!(instance.demand(1), 50);
        assert_eq!(instance.demand(2), -30);
        assert!((instance.distance(1, 2) - 15.0).abs() < 1e-10);
    }

    #[test]
    fn test_write_csv_reloads() {
        let p = RoutingParameters { depot_max_stock: 1_000_000, vehicle_capacity: 100_000, ..params() };
        let original = ProblemInstance::random(6, &p, 17).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let demands_path = dir.path().join("demands.csv");
        let distances_path = dir.path().join("distances.csv");
        original.write_csv(&demands_path, &distances_path).unwrap();

        let reloaded = ProblemInstance::from_csv(&demands_path, &distances_path, &p).unwrap();
        assert_eq!(reloaded.nodes(), original.nodes());
        assert_eq!(reloaded.distance(3, 5), original.distance(3, 5));
    }

    #[test]
    fn test_statistics() {
        let instance = ProblemInstance::new("t", vec![0, 50, -30, 20, 0], matrix(5), &params()).unwrap();
        let stats = instance.statistics();
        assert_eq!(stats.num_pickups, 2);
        assert_eq!(stats.num_deliveries, 1);
        assert_eq!(stats.num_neutral, 1);
        assert_eq!(stats.total_pickup, 70);
        assert_eq!(stats.total_delivery, 30);
        assert!((stats.max_distance - 40.0).abs() < 1e-10);
    }
}
