// core/state.rs

// Lifecycle of the control loop. Two states only: the loop is Running from
// construction until a stop signal or a fatal configuration error moves it to
// Stopped. There is no way back.

use log::info;
use serde::Serialize;

// Control loop states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Running, // Ticking at the configured rate
    Stopped, // Terminal, no more commands are issued
}

/// Why the loop left Running
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Operator interrupt or stop handle
    Signal,
    /// Configured tick limit reached
    TickLimit,
    /// A tick failed with a fatal configuration error
    ConfigError(String),
}

pub struct LoopStateMachine {
    current: LoopState,
    reason: Option<StopReason>,
}

impl LoopStateMachine {
    /// Starts in Running
    pub fn new() -> Self {
        LoopStateMachine {
            current: LoopState::Running,
            reason: None,
        }
    }

    /// Moves Running -> Stopped. Returns false if already stopped.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        match self.current {
            LoopState::Running => {
                info!("Control loop transitioned to Stopped: {:?}", reason);
                self.current = LoopState::Stopped;
                self.reason = Some(reason);
                true
            }
            LoopState::Stopped => false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.current
    }

    pub fn is_running(&self) -> bool {
        self.current == LoopState::Running
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.reason.as_ref()
    }
}

impl Default for LoopStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
