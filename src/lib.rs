//! Potfield - per-robot artificial potential field controller
//!
//! Each robot of a fleet runs its own instance. The controller pulls the robot
//! toward a fixed goal, pushes it away from range-scan obstacles and from the
//! other robots' observed poses, and turns the resultant force into a bounded
//! linear/angular velocity command on a fixed-rate loop. Robots coordinate
//! only by watching each other's poses.

#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod error;
pub mod navigation;
pub mod ros_interface;

// Re-export commonly used items for easier access
pub use self::config::{Goal, PotFieldConfig, RobotConfig};
pub use self::core::{
    ControlLoop, LoopConfig, LoopState, ObstaclePoint, Pose, PoseTracker, RangeScan,
    RangeScanProcessor, StopHandle,
};
pub use self::error::PotFieldError;
pub use self::navigation::{
    ForceVector, MapperConfig, PotentialFieldSolver, SolverConfig, VelocityCommand,
    VelocityMapper,
};
pub use self::ros_interface::{
    observation_channel, CommandSink, JsonLinesSink, LatestCommandSink, Observation,
    ObservationFeed, ObservationInbox,
};
