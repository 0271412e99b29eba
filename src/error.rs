// src/error.rs
// Error type shared by every fallible operation in the controller.

use thiserror::Error;

/// Errors raised by configuration, observation handling and command output.
///
/// Sensor noise and numeric degeneracies never show up here: they are
/// absorbed by filtering in the scan processor and by the solver's
/// saturation branches.
#[derive(Debug, Error)]
pub enum PotFieldError {
    /// A tunable or CLI value is out of its valid range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Robot index does not fit inside the fleet
    #[error("Invalid fleet: robot id {id} with fleet size {fleet_size}")]
    InvalidFleet { id: usize, fleet_size: usize },

    /// Observation addressed to a robot outside the fleet
    #[error("Unknown robot index {index} (fleet size {fleet_size})")]
    UnknownRobot { index: usize, fleet_size: usize },

    /// Command sink refused a velocity command
    #[error("Command sink error: {0}")]
    Sink(String),

    /// The consuming side of the observation feed is gone
    #[error("Observation feed closed")]
    FeedClosed,

    /// `run` called on a loop that has already stopped
    #[error("Control loop already stopped")]
    AlreadyStopped,

    /// Transport message that cannot be turned into an observation
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PotFieldError {
    /// True for errors that must keep the control loop from starting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PotFieldError::Config(_) | PotFieldError::InvalidFleet { .. } | PotFieldError::Yaml(_)
        )
    }
}
