// core/mod.rs

// Per-robot state and the loop that drives it: fleet pose table, scan
// filtering, loop lifecycle and the fixed-rate control loop itself.

pub mod control_loop;
pub mod localization;
pub mod perception;
pub mod state;

pub use control_loop::{ControlLoop, LoopConfig, LoopStatus, StopHandle};
pub use localization::{normalize_angle, Pose, PoseTracker};
pub use perception::{ObstaclePoint, RangeReading, RangeScan, RangeScanProcessor};
pub use state::{LoopState, LoopStateMachine, StopReason};
