//! Cash PDP Solver Library
//!
//! A multi-restart greedy solver for the single-depot cash pickup and
//! delivery problem: a fleet of capacity- and distance-limited vehicles
//! collects cash from pickup nodes and supplies delivery nodes, while the
//! depot stock should stay under its storage limit.
//!
//! # Features
//!
//! - Randomized weighted greedy construction with pluggable scoring strategies
//! - Best-of-N search with iteration and wall-clock budgets
//! - Parallel search with per-worker seeded random streams
//! - CSV/JSON exports and per-vehicle metrics
//! - Benchmarking across strategies and seeds
//!
//! # Example
//!
//! ```no_run
//! use cash_pdp_solver::instance::ProblemInstance;
//! use cash_pdp_solver::parameters::RoutingParameters;
//! use cash_pdp_solver::heuristics::{solve, SolverOptions};
//!
//! let params = RoutingParameters::from_file("parameters.csv").unwrap();
//! let instance = ProblemInstance::from_csv("demands.csv", "distances.csv", &params).unwrap();
//!
//! let outcome = solve(&instance, &params, &SolverOptions::default());
//! if let Some(best) = outcome.best {
//!     println!("{}", best);
//! }
//! ```

pub mod error;
pub mod random;
pub mod parameters;
pub mod instance;
pub mod vehicle;
pub mod solution;
pub mod fitness;
pub mod heuristics;
pub mod export;
pub mod benchmark;

pub use error::{Result, SolverError};
pub use instance::ProblemInstance;
pub use parameters::RoutingParameters;
pub use solution::Solution;
