// core/perception.rs

// Turns a raw range-bearing scan into obstacle points relative to the robot.
// Each valid reading becomes one point; there is no clustering and nothing
// survives from one scan to the next.

use serde::{Deserialize, Serialize};

/// One range reading: distance along a beam at an angular offset from the
/// robot's heading (radians, counter-clockwise positive)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeReading {
    pub distance: f64,
    pub angle: f64,
}

// Laser scan as delivered by the range-scan feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    pub readings: Vec<RangeReading>,
    /// Readings shorter than this are sensor artifacts
    #[serde(default)]
    pub range_min: f64,
    /// Readings beyond this mean "no return", not "obstacle at max range"
    pub range_max: f64,
}

impl RangeScan {
    /// Builds a scan from explicit (distance, angle offset) pairs
    pub fn from_pairs(pairs: &[(f64, f64)], range_max: f64) -> Self {
        RangeScan {
            readings: pairs
                .iter()
                .map(|&(distance, angle)| RangeReading { distance, angle })
                .collect(),
            range_min: 0.0,
            range_max,
        }
    }

    /// Builds a scan from the usual laser layout: the i-th range sits at
    /// `angle_min + i * angle_increment`
    pub fn from_laser(
        angle_min: f64,
        angle_increment: f64,
        range_min: f64,
        range_max: f64,
        ranges: &[f64],
    ) -> Self {
        RangeScan {
            readings: ranges
                .iter()
                .enumerate()
                .map(|(i, &distance)| RangeReading {
                    distance,
                    angle: angle_min + i as f64 * angle_increment,
                })
                .collect(),
            range_min,
            range_max,
        }
    }
}

/// Obstacle estimate relative to the robot. `distance` is always finite and
/// positive once it leaves the processor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePoint {
    pub distance: f64,
    /// Bearing relative to the robot heading (radians)
    pub bearing: f64,
}

/// Stateless filter from scan readings to obstacle points
#[derive(Clone, Copy, Debug, Default)]
pub struct RangeScanProcessor;

impl RangeScanProcessor {
    pub fn new() -> Self {
        RangeScanProcessor
    }

    /// Lazily yields one obstacle point per valid reading.
    ///
    /// Dropped readings: non-finite distance or angle, distance <= 0, below
    /// `range_min`, or beyond `range_max`. Calling this again on the same scan
    /// yields the same points.
    pub fn process<'a>(
        &self,
        scan: &'a RangeScan,
    ) -> impl Iterator<Item = ObstaclePoint> + use<'a> {
        let range_min = scan.range_min;
        let range_max = scan.range_max;
        scan.readings.iter().filter_map(move |reading| {
            let valid = reading.distance.is_finite()
                && reading.angle.is_finite()
                && reading.distance > 0.0
                && reading.distance >= range_min
                && reading.distance <= range_max;
            valid.then_some(ObstaclePoint {
                distance: reading.distance,
                bearing: reading.angle,
            })
        })
    }
}
