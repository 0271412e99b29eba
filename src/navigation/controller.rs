// src/navigation/controller.rs
// Maps the field's resultant force onto a differential-drive velocity command.
// Turn-then-drive: large heading errors rotate in place, small ones drive
// forward with speed scaled by cos(heading error).

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use super::planner::ForceVector;
use crate::core::normalize_angle;
use crate::error::PotFieldError;

// Below this force magnitude the direction is meaningless
const MIN_FORCE: f64 = 1e-9;

/// Linear/angular velocity command for the robot base
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed (m/s)
    pub linear: f64,
    /// Yaw rate (rad/s, counter-clockwise positive)
    pub angular: f64,
}

impl VelocityCommand {
    pub fn new(linear: f64, angular: f64) -> Self {
        VelocityCommand { linear, angular }
    }

    pub fn zero() -> Self {
        VelocityCommand::default()
    }

    pub fn is_zero(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}

/// Kinematic limits and gains of the mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub max_linear_speed: f64,
    pub max_angular_speed: f64,
    /// Proportional gain on heading error (k_p)
    pub heading_gain: f64,
    /// Linear speed per unit of force
    pub linear_scale: f64,
    /// Heading error above which the robot only rotates
    pub turn_in_place_threshold: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            max_linear_speed: 2.0,
            max_angular_speed: FRAC_PI_2,
            heading_gain: 2.0,
            linear_scale: 0.5,
            turn_in_place_threshold: FRAC_PI_4,
        }
    }
}

impl MapperConfig {
    pub fn validate(&self) -> Result<(), PotFieldError> {
        for (name, value) in [
            ("max_linear_speed", self.max_linear_speed),
            ("max_angular_speed", self.max_angular_speed),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PotFieldError::Config(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("heading_gain", self.heading_gain),
            ("linear_scale", self.linear_scale),
            ("turn_in_place_threshold", self.turn_in_place_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PotFieldError::Config(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Converts forces into commands that always respect the configured limits
#[derive(Debug, Clone)]
pub struct VelocityMapper {
    config: MapperConfig,
}

impl VelocityMapper {
    pub fn new(config: MapperConfig) -> Result<Self, PotFieldError> {
        config.validate()?;
        Ok(VelocityMapper { config })
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Maps a world-frame force to a command for a robot facing `heading`.
    /// A zero (or non-finite) force yields a zero command.
    pub fn map(&self, force: ForceVector, heading: f64) -> VelocityCommand {
        let magnitude = force.magnitude();
        if !magnitude.is_finite() || magnitude < MIN_FORCE {
            return VelocityCommand::zero();
        }

        let max_w = self.config.max_angular_speed;
        let max_v = self.config.max_linear_speed;

        let heading_error = normalize_angle(force.direction() - heading);
        let angular = (self.config.heading_gain * heading_error).clamp(-max_w, max_w);

        let linear = if heading_error.abs() > self.config.turn_in_place_threshold {
            0.0
        } else {
            let speed = (magnitude * self.config.linear_scale).clamp(0.0, max_v);
            (speed * heading_error.cos()).clamp(0.0, max_v)
        };

        VelocityCommand { linear, angular }
    }
}
