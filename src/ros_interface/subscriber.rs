// src/ros_interface/subscriber.rs
// Observation intake. The transport owns an `ObservationFeed` and pushes pose
// and scan updates into it from its own thread; the control loop owns the
// single `ObservationInbox` and drains it once per tick.

use crossbeam_channel::{Receiver, Sender};
use log::warn;
use nalgebra::{Quaternion, UnitQuaternion};
use serde::Deserialize;
use std::io::BufRead;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::core::{normalize_angle, Pose, RangeScan};
use crate::error::PotFieldError;

/// One update from the outside world
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Pose of fleet member `robot` (including this robot)
    Pose { robot: usize, pose: Pose },
    /// Latest range scan of this robot
    Scan(RangeScan),
}

/// Creates a connected producer/consumer pair
pub fn observation_channel() -> (ObservationFeed, ObservationInbox) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ObservationFeed { tx }, ObservationInbox { rx })
}

/// Producer handle, cloned into every transport callback
#[derive(Debug, Clone)]
pub struct ObservationFeed {
    tx: Sender<Observation>,
}

impl ObservationFeed {
    pub fn publish(&self, observation: Observation) -> Result<(), PotFieldError> {
        self.tx.send(observation).map_err(|_| PotFieldError::FeedClosed)
    }

    pub fn publish_pose(&self, robot: usize, pose: Pose) -> Result<(), PotFieldError> {
        self.publish(Observation::Pose { robot, pose })
    }

    pub fn publish_scan(&self, scan: RangeScan) -> Result<(), PotFieldError> {
        self.publish(Observation::Scan(scan))
    }
}

/// Consumer side, owned by the control loop
#[derive(Debug)]
pub struct ObservationInbox {
    rx: Receiver<Observation>,
}

impl ObservationInbox {
    /// Takes everything queued at the moment of the call. Observations that
    /// arrive while draining stay queued for the next drain.
    pub fn drain(&self) -> Vec<Observation> {
        let queued = self.rx.len();
        self.rx.try_iter().take(queued).collect()
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Yaw of an orientation quaternion, in (-π, π]
pub fn heading_from_quaternion(x: f64, y: f64, z: f64, w: f64) -> f64 {
    let q = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
    let (_roll, _pitch, yaw) = q.euler_angles();
    normalize_angle(yaw)
}

// JSON-lines wire format used by the stand-in transport

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireMessage {
    Pose(WirePose),
    Scan(WireScan),
}

#[derive(Debug, Deserialize)]
struct WireQuaternion {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

#[derive(Debug, Deserialize)]
struct WirePose {
    robot: usize,
    x: f64,
    y: f64,
    heading: Option<f64>,
    orientation: Option<WireQuaternion>,
    /// Seconds since the Unix epoch; receive time when absent
    stamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireScan {
    angle_min: f64,
    angle_increment: f64,
    #[serde(default)]
    range_min: f64,
    range_max: f64,
    /// `null` stands for a non-finite reading
    ranges: Vec<Option<f64>>,
}

fn now_since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Parses one JSON line such as
/// `{"pose":{"robot":1,"x":0.5,"y":2.0,"heading":0.1}}` or
/// `{"scan":{"angle_min":-1.57,"angle_increment":0.01,"range_max":5.0,"ranges":[1.0,null]}}`
pub fn parse_observation(line: &str) -> Result<Observation, PotFieldError> {
    match serde_json::from_str::<WireMessage>(line)? {
        WireMessage::Pose(p) => {
            let heading = match (p.heading, p.orientation) {
                (Some(heading), _) => heading,
                (None, Some(q)) => heading_from_quaternion(q.x, q.y, q.z, q.w),
                (None, None) => {
                    return Err(PotFieldError::Malformed(format!(
                        "pose for robot {} has neither heading nor orientation",
                        p.robot
                    )));
                }
            };
            let stamp = match p.stamp {
                Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
                Some(secs) => {
                    return Err(PotFieldError::Malformed(format!("invalid stamp {}", secs)));
                }
                None => now_since_epoch(),
            };
            Ok(Observation::Pose {
                robot: p.robot,
                pose: Pose::new(p.x, p.y, heading, stamp),
            })
        }
        WireMessage::Scan(s) => {
            let ranges: Vec<f64> = s.ranges.iter().map(|r| r.unwrap_or(f64::NAN)).collect();
            Ok(Observation::Scan(RangeScan::from_laser(
                s.angle_min,
                s.angle_increment,
                s.range_min,
                s.range_max,
                &ranges,
            )))
        }
    }
}

/// Spawns a thread that reads JSON lines from `reader` and forwards them to
/// `feed`. Bad lines are logged and skipped; the thread ends at EOF or when
/// the inbox is dropped.
pub fn spawn_json_lines_reader<R>(reader: R, feed: ObservationFeed) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Observation stream read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_observation(&line) {
                Ok(observation) => {
                    if feed.publish(observation).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Dropping observation line: {}", e),
            }
        }
    })
}
