//! Potential-field navigation
//!
//! `planner` turns the robot's view of the world into a resultant force,
//! `controller` turns that force into a bounded velocity command.

pub mod controller;
pub mod planner;

pub use controller::{MapperConfig, VelocityCommand, VelocityMapper};
pub use planner::{ForceVector, PotentialFieldSolver, SolverConfig};
