// Control loop behaviour: snapshot consistency, shutdown, stop signal

use parking_lot::Mutex;
use potfield::{
    observation_channel, CommandSink, ControlLoop, Goal, LatestCommandSink, LoopConfig, LoopState,
    MapperConfig, ObservationFeed, PotFieldConfig, PotFieldError, Pose, RangeScan, RobotConfig,
    VelocityCommand,
};
use potfield::core::StopReason;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Records when each command arrives; the first publish blocks for `stall`
struct StallingSink {
    stall: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl CommandSink for StallingSink {
    fn publish(&mut self, _command: VelocityCommand) -> Result<(), PotFieldError> {
        let mut arrivals = self.arrivals.lock();
        arrivals.push(Instant::now());
        if arrivals.len() == 1 {
            thread::sleep(self.stall);
        }
        Ok(())
    }
}

fn stamp(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

fn setup(control: LoopConfig) -> (ObservationFeed, LatestCommandSink, ControlLoop<LatestCommandSink>) {
    let config = PotFieldConfig {
        control,
        ..PotFieldConfig::default()
    };
    let robot = RobotConfig::new(0, 3, Goal::new(10.0, 0.0), &MapperConfig::default()).unwrap();
    let (feed, inbox) = observation_channel();
    let sink = LatestCommandSink::new();
    let control = ControlLoop::new(robot, &config, inbox, sink.clone()).unwrap();
    (feed, sink, control)
}

#[test]
fn test_mid_tick_pose_update_applies_next_tick() {
    let (feed, _sink, mut control) = setup(LoopConfig::default());
    feed.publish_pose(0, Pose::new(0.0, 0.0, 0.0, stamp(1))).unwrap();
    feed.publish_pose(1, Pose::new(-50.0, 50.0, 0.0, stamp(1))).unwrap();
    control.tick().unwrap();
    let baseline = control.status().last_force;

    // Tick 2 starts: observations drained, then robot 2 reports in front of us
    control.drain_observations();
    feed.publish_pose(2, Pose::new(0.5, 0.0, 0.0, stamp(2))).unwrap();
    control.step().unwrap();
    assert_eq!(control.status().last_force, baseline);

    // Tick 3 sees it
    control.tick().unwrap();
    assert!(control.status().last_force.fx < baseline.fx);
}

#[test]
fn test_latest_scan_replaces_previous() {
    let (feed, _sink, mut control) = setup(LoopConfig::default());
    feed.publish_pose(0, Pose::new(0.0, 0.0, 0.0, stamp(1))).unwrap();
    feed.publish_scan(RangeScan::from_pairs(&[(0.2, 0.0)], 5.0)).unwrap();
    control.tick().unwrap();
    assert!(control.status().last_force.fx < 0.0);

    feed.publish_scan(RangeScan::from_pairs(&[], 5.0)).unwrap();
    control.tick().unwrap();
    assert!((control.status().last_force.fx - 10.0).abs() < 1e-9);
}

#[test]
fn test_pose_for_unknown_robot_is_ignored() {
    let (feed, _sink, mut control) = setup(LoopConfig::default());
    feed.publish_pose(7, Pose::new(1.0, 1.0, 0.0, stamp(1))).unwrap();
    assert_eq!(control.drain_observations(), 1);
    assert_eq!(control.tracker().neighbors().count(), 0);
}

#[test]
fn test_tick_limit_stops_with_zero_command() {
    let control_config = LoopConfig {
        frequency_hz: 200.0,
        max_ticks: Some(4),
    };
    let (feed, sink, mut control) = setup(control_config);
    feed.publish_pose(0, Pose::new(0.0, 0.0, 0.0, stamp(1))).unwrap();

    control.run().unwrap();

    assert_eq!(sink.published(), 5);
    assert!(sink.latest().unwrap().is_zero());
    assert_eq!(control.status().state, LoopState::Stopped);
}

#[test]
fn test_stop_handle_ends_run() {
    let (feed, sink, mut control) = setup(LoopConfig {
        frequency_hz: 100.0,
        max_ticks: None,
    });
    feed.publish_pose(0, Pose::new(0.0, 0.0, 0.0, stamp(1))).unwrap();

    let stop = control.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stop.stop();
    });

    control.run().unwrap();
    stopper.join().unwrap();

    assert_eq!(control.stop_reason(), Some(&StopReason::Signal));
    assert!(control.status().ticks > 0);
    assert!(sink.latest().unwrap().is_zero());
    assert_eq!(sink.published(), control.status().ticks + 1);
}

#[test]
fn test_overrun_is_not_caught_up() {
    let period = Duration::from_millis(20);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let sink = StallingSink {
        stall: period * 8,
        arrivals: arrivals.clone(),
    };
    let config = PotFieldConfig {
        control: LoopConfig {
            frequency_hz: 50.0,
            max_ticks: Some(5),
        },
        ..PotFieldConfig::default()
    };
    let robot = RobotConfig::new(0, 1, Goal::new(10.0, 0.0), &MapperConfig::default()).unwrap();
    let (_feed, inbox) = observation_channel();
    let mut control = ControlLoop::new(robot, &config, inbox, sink).unwrap();

    control.run().unwrap();

    let status = control.status();
    assert_eq!(status.ticks, 5);
    assert!(status.overruns >= 1);

    // Five ticks plus the shutdown command. After the stalled first tick the
    // loop re-anchors, so the remaining ticks keep their spacing instead of
    // firing back to back to make up the missed periods.
    let arrivals = arrivals.lock();
    assert_eq!(arrivals.len(), 6);
    for pair in arrivals[1..5].windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= period * 3 / 4, "tick fired {:?} after the previous one", gap);
    }
}
