//! Error types shared by the whole solver.

use thiserror::Error;

/// Which aggregate bound an instance violates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Infeasibility {
    /// Signed demand total is larger than what the whole fleet can carry.
    ExceedsFleetCapacity { total_demand: i64, fleet_capacity: i64 },
    /// Signed demand total is larger than the depot can store.
    ExceedsMaxStock { total_demand: i64, max_stock: i64 },
}

impl std::fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Infeasibility::ExceedsFleetCapacity { total_demand, fleet_capacity } => write!(
                f,
                "total demand must not exceed the total vehicle capacity, {} > {}",
                total_demand, fleet_capacity
            ),
            Infeasibility::ExceedsMaxStock { total_demand, max_stock } => write!(
                f,
                "total demand must not exceed the maximum stock, {} > {}",
                total_demand, max_stock
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    /// Raised once when the instance is built; the search never starts.
    #[error("instance infeasible: {0}")]
    InstanceInfeasible(Infeasibility),

    /// Malformed problem data (matrix shape, negative distances, ...).
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A finished solution breaks one of the routing invariants.
    #[error("invalid solution: {0}")]
    InvalidSolution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasibility_message() {
        let err = SolverError::InstanceInfeasible(Infeasibility::ExceedsMaxStock {
            total_demand: 120,
            max_stock: 100,
        });
        let msg = err.to_string();
        assert!(msg.starts_with("instance infeasible"));
        assert!(msg.contains("120 > 100"));
    }
}
