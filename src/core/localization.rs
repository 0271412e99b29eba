// core/localization.rs

// Keeps the latest known pose of every robot in the fleet. Poses arrive from
// the observation feed (ground-truth or odometry) and replace the stored value
// wholesale; nothing is filtered or rolled back.

use log::warn;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

use crate::error::PotFieldError;

/// Wraps an angle into (-π, π]. Non-finite input maps to 0.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

// Pose: planar position (x, y) plus heading, stamped with the observation time
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,       // X position (meters)
    pub y: f64,       // Y position (meters)
    pub heading: f64, // Orientation (radians, (-π, π])
    /// Observation time since the Unix epoch; `None` until the first observation
    pub stamp: Option<Duration>,
}

impl Pose {
    /// Creates an observed pose, normalizing the heading
    pub fn new(x: f64, y: f64, heading: f64, stamp: Duration) -> Self {
        Pose {
            x,
            y,
            heading: normalize_angle(heading),
            stamp: Some(stamp),
        }
    }

    /// Placeholder pose for a robot that has not been observed yet
    pub fn unknown() -> Self {
        Pose {
            x: 0.0,
            y: 0.0,
            heading: 0.0,
            stamp: None,
        }
    }

    /// Whether at least one observation has been applied
    pub fn is_known(&self) -> bool {
        self.stamp.is_some()
    }

    /// Euclidean distance to a point
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }

    /// World-frame bearing from this pose to a point
    pub fn bearing_to(&self, x: f64, y: f64) -> f64 {
        (y - self.y).atan2(x - self.x)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::unknown()
    }
}

/// Pose table for the whole fleet, indexed by robot id.
///
/// Only the control loop mutates it, applying observations drained from the
/// feed at the start of each tick, so no locking is needed.
#[derive(Clone, Debug)]
pub struct PoseTracker {
    own_id: usize,
    poses: Vec<Pose>,
}

impl PoseTracker {
    /// Creates a table of `fleet_size` unknown poses
    pub fn new(own_id: usize, fleet_size: usize) -> Result<Self, PotFieldError> {
        if fleet_size == 0 || own_id >= fleet_size {
            return Err(PotFieldError::InvalidFleet {
                id: own_id,
                fleet_size,
            });
        }
        Ok(PoseTracker {
            own_id,
            poses: vec![Pose::unknown(); fleet_size],
        })
    }

    /// Overwrites the stored pose for `index` (last observation wins).
    ///
    /// An observation stamped earlier than the stored one is still applied,
    /// but logged as a clock or delivery-order anomaly.
    pub fn update_pose(&mut self, index: usize, pose: Pose) -> Result<(), PotFieldError> {
        let fleet_size = self.poses.len();
        let slot = self
            .poses
            .get_mut(index)
            .ok_or(PotFieldError::UnknownRobot { index, fleet_size })?;

        if let (Some(stored), Some(incoming)) = (slot.stamp, pose.stamp) {
            if incoming < stored {
                warn!(
                    "Out-of-order pose for robot {}: incoming stamp {:?} older than stored {:?}",
                    index, incoming, stored
                );
            }
        }

        *slot = Pose {
            heading: normalize_angle(pose.heading),
            ..pose
        };
        Ok(())
    }

    /// Returns the current snapshot for `index`
    pub fn get_pose(&self, index: usize) -> Option<Pose> {
        self.poses.get(index).copied()
    }

    /// Returns this robot's own pose
    pub fn get_self_pose(&self) -> Pose {
        self.poses[self.own_id]
    }

    pub fn own_id(&self) -> usize {
        self.own_id
    }

    pub fn fleet_size(&self) -> usize {
        self.poses.len()
    }

    /// Observed poses of every other fleet member; unseen robots are skipped
    pub fn neighbors(&self) -> impl Iterator<Item = (usize, &Pose)> + '_ {
        self.poses
            .iter()
            .enumerate()
            .filter(move |(i, pose)| *i != self.own_id && pose.is_known())
    }
}
