// src/config.rs
// Run configuration: robot identity and goal from the command line, field and
// mapper tunables from an optional YAML file.

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::LoopConfig;
use crate::error::PotFieldError;
use crate::navigation::{MapperConfig, SolverConfig};

/// Goal position in world coordinates, fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub x: f64,
    pub y: f64,
}

impl Goal {
    pub fn new(x: f64, y: f64) -> Self {
        Goal { x, y }
    }
}

/// Identity, goal and kinematic limits of one robot
#[derive(Debug, Clone, PartialEq)]
pub struct RobotConfig {
    /// 0-indexed robot id
    pub id: usize,
    /// Number of robots, positive
    pub fleet_size: usize,
    pub goal: Goal,
    pub max_linear_speed: f64,
    pub max_angular_speed: f64,
}

impl RobotConfig {
    /// Checks `fleet_size >= 1`, `id < fleet_size` and a finite goal
    pub fn new(
        id: usize,
        fleet_size: usize,
        goal: Goal,
        mapper: &MapperConfig,
    ) -> Result<Self, PotFieldError> {
        if fleet_size == 0 || id >= fleet_size {
            return Err(PotFieldError::InvalidFleet { id, fleet_size });
        }
        if !goal.x.is_finite() || !goal.y.is_finite() {
            return Err(PotFieldError::Config(format!(
                "goal must be finite, got ({}, {})",
                goal.x, goal.y
            )));
        }
        Ok(RobotConfig {
            id,
            fleet_size,
            goal,
            max_linear_speed: mapper.max_linear_speed,
            max_angular_speed: mapper.max_angular_speed,
        })
    }
}

/// Tunables loaded from YAML; every section falls back to its defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotFieldConfig {
    pub solver: SolverConfig,
    pub mapper: MapperConfig,
    pub control: LoopConfig,
}

impl PotFieldConfig {
    /// Parses and validates a YAML document
    pub fn from_yaml(text: &str) -> Result<Self, PotFieldError> {
        let config: PotFieldConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PotFieldError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let config: PotFieldConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PotFieldError> {
        self.solver.validate()?;
        self.mapper.validate()?;
        self.control.validate()
    }
}
