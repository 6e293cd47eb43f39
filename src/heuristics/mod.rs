//! Heuristics module for the cash pickup and delivery problem.
//!
//! This module exports the scoring strategies, the greedy solution builder
//! and the sequential and parallel search controllers.

pub mod scoring;
pub mod builder;
pub mod search;
pub mod parallel;

pub use scoring::*;
pub use builder::*;
pub use search::*;
pub use parallel::*;
