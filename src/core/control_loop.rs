// core/control_loop.rs

// Fixed-rate control loop. Each tick drains the observation inbox, filters the
// latest scan, solves the potential field, maps the force to a velocity
// command and hands it to the sink. Observations that arrive after the drain
// only become visible on the next tick.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::localization::PoseTracker;
use super::perception::{RangeScan, RangeScanProcessor};
use super::state::{LoopState, LoopStateMachine, StopReason};
use crate::config::{PotFieldConfig, RobotConfig};
use crate::error::PotFieldError;
use crate::navigation::{ForceVector, PotentialFieldSolver, VelocityCommand, VelocityMapper};
use crate::ros_interface::{CommandSink, Observation, ObservationInbox};

/// Loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Tick rate (Hz)
    pub frequency_hz: f64,
    /// Stop after this many ticks; `None` runs until stopped
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            frequency_hz: 30.0,
            max_ticks: None,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), PotFieldError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(PotFieldError::Config(format!(
                "Invalid frequency_hz: {} (must be > 0)",
                self.frequency_hz
            )));
        }
        if self.frequency_hz > 1000.0 {
            warn!(
                "Very high control frequency: {} Hz. Ticks are likely to overrun.",
                self.frequency_hz
            );
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }
}

/// Cloneable stop request, safe to trigger from a signal handler
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Snapshot of loop progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopStatus {
    pub state: LoopState,
    pub ticks: u64,
    /// Ticks that took longer than the period
    pub overruns: u64,
    pub last_force: ForceVector,
    pub last_command: Option<VelocityCommand>,
}

/// Per-robot controller driving a command sink at a fixed rate
pub struct ControlLoop<S: CommandSink> {
    robot: RobotConfig,
    control: LoopConfig,
    tracker: PoseTracker,
    latest_scan: Option<RangeScan>,
    processor: RangeScanProcessor,
    solver: PotentialFieldSolver,
    mapper: VelocityMapper,
    inbox: ObservationInbox,
    sink: S,
    fsm: LoopStateMachine,
    stop: StopHandle,
    ticks: u64,
    overruns: u64,
    last_force: ForceVector,
    last_command: Option<VelocityCommand>,
}

impl<S: CommandSink> ControlLoop<S> {
    /// Builds the loop in the Running state. Any invalid tunable is fatal here,
    /// before a single command is issued.
    pub fn new(
        robot: RobotConfig,
        config: &PotFieldConfig,
        inbox: ObservationInbox,
        sink: S,
    ) -> Result<Self, PotFieldError> {
        config.validate()?;
        let tracker = PoseTracker::new(robot.id, robot.fleet_size)?;
        let solver = PotentialFieldSolver::new(config.solver.clone())?;
        let mapper = VelocityMapper::new(config.mapper.clone())?;

        Ok(ControlLoop {
            robot,
            control: config.control.clone(),
            tracker,
            latest_scan: None,
            processor: RangeScanProcessor::new(),
            solver,
            mapper,
            inbox,
            sink,
            fsm: LoopStateMachine::new(),
            stop: StopHandle::default(),
            ticks: 0,
            overruns: 0,
            last_force: ForceVector::zero(),
            last_command: None,
        })
    }

    /// Handle that ends `run` after the in-flight tick
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn tracker(&self) -> &PoseTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            state: self.fsm.state(),
            ticks: self.ticks,
            overruns: self.overruns,
            last_force: self.last_force,
            last_command: self.last_command,
        }
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.fsm.stop_reason()
    }

    /// Applies every observation queued so far; returns how many were applied
    pub fn drain_observations(&mut self) -> usize {
        let observations = self.inbox.drain();
        let count = observations.len();
        for observation in observations {
            match observation {
                Observation::Pose { robot, pose } => {
                    if let Err(e) = self.tracker.update_pose(robot, pose) {
                        warn!("Ignoring pose observation: {}", e);
                    }
                }
                Observation::Scan(scan) => self.latest_scan = Some(scan),
            }
        }
        count
    }

    /// Computes and publishes one command from the current snapshot.
    ///
    /// Until this robot's own pose has been observed the command is zero.
    pub fn step(&mut self) -> Result<VelocityCommand, PotFieldError> {
        let me = self.tracker.get_self_pose();

        let (force, command) = if me.is_known() {
            let processor = &self.processor;
            let obstacles = self
                .latest_scan
                .iter()
                .flat_map(|scan| processor.process(scan));
            let neighbors = self.tracker.neighbors().map(|(_, pose)| pose);

            let force = self.solver.compute(&me, &self.robot.goal, neighbors, obstacles);
            (force, self.mapper.map(force, me.heading))
        } else {
            debug!("Own pose not observed yet, holding still");
            (ForceVector::zero(), VelocityCommand::zero())
        };

        self.last_force = force;
        self.sink.publish(command)?;
        self.last_command = Some(command);

        debug!(
            "force=({:.3}, {:.3}) -> linear={:.3}, angular={:.3}",
            force.fx, force.fy, command.linear, command.angular
        );
        Ok(command)
    }

    /// One full tick: drain, then step
    pub fn tick(&mut self) -> Result<VelocityCommand, PotFieldError> {
        self.drain_observations();
        let command = self.step();
        self.ticks += 1;
        command
    }

    /// Runs until the stop handle fires or the tick limit is reached, then
    /// publishes a final zero command. Overrunning ticks are not caught up.
    ///
    /// Tick errors are logged and the loop carries on, except fatal ones
    /// (see [`PotFieldError::is_fatal`]) which stop it and are returned
    /// after the zero command has gone out.
    pub fn run(&mut self) -> Result<(), PotFieldError> {
        if !self.fsm.is_running() {
            return Err(PotFieldError::AlreadyStopped);
        }

        let period = self.control.period();
        info!(
            "Robot {}/{} heading for goal ({}, {}) at {} Hz",
            self.robot.id,
            self.robot.fleet_size,
            self.robot.goal.x,
            self.robot.goal.y,
            self.control.frequency_hz
        );

        let mut fatal = None;
        let mut next_tick = Instant::now();
        while self.fsm.is_running() {
            if self.stop.is_stop_requested() {
                self.fsm.stop(StopReason::Signal);
                break;
            }
            if let Some(max_ticks) = self.control.max_ticks {
                if self.ticks >= max_ticks {
                    self.fsm.stop(StopReason::TickLimit);
                    break;
                }
            }

            match self.tick() {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!("Tick {} failed fatally: {}", self.ticks, e);
                    self.fsm.stop(StopReason::ConfigError(e.to_string()));
                    fatal = Some(e);
                    break;
                }
                Err(e) => error!("Tick {} failed to publish: {}", self.ticks, e),
            }

            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                self.overruns += 1;
                warn!(
                    "Control loop overrun: tick {} finished {:?} past its deadline",
                    self.ticks,
                    now - next_tick
                );
                next_tick = now;
            }
        }

        self.shutdown()?;
        fatal.map_or(Ok(()), Err)
    }

    // Leaves the robot stationary instead of repeating the last command
    fn shutdown(&mut self) -> Result<(), PotFieldError> {
        let stop = VelocityCommand::zero();
        self.sink.publish(stop)?;
        self.last_command = Some(stop);
        info!(
            "Control loop stopped after {} ticks ({} overruns)",
            self.ticks, self.overruns
        );
        Ok(())
    }
}
