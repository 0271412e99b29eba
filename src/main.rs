// src/main.rs
// Entry point for one potential-field robot: parse the CLI, wire the
// observation feed and command sink, and run the control loop until Ctrl+C.
//
// Observations are read as JSON lines from stdin and commands are written as
// JSON lines to stdout; logs go to stderr.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{error, info};
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use potfield::ros_interface::spawn_json_lines_reader;
use potfield::{
    observation_channel, ControlLoop, Goal, JsonLinesSink, PotFieldConfig, PotFieldError,
    RobotConfig,
};

/// Drive one robot of a fleet to a goal with an artificial potential field
#[derive(Parser, Debug)]
#[command(name = "potfield_bot", version, allow_negative_numbers = true)]
struct Args {
    /// 0-indexed id of this robot
    #[arg(value_name = "ROBOT_NUM_ID")]
    robot_id: usize,

    /// Number of robots in the fleet
    #[arg(value_name = "NUM_ROBOTS", value_parser = clap::value_parser!(u32).range(1..))]
    num_robots: u32,

    /// Goal X coordinate
    #[arg(value_name = "GOAL_X")]
    goal_x: f64,

    /// Goal Y coordinate
    #[arg(value_name = "GOAL_Y")]
    goal_y: f64,

    /// YAML file with solver, mapper and loop tunables
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Control loop rate in Hz (overrides the config file)
    #[arg(long, value_name = "HZ")]
    rate: Option<f64>,

    /// Stop after this many ticks instead of running until interrupted
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            _ => {
                let _ = e.print();
                return usage_failure();
            }
        },
    };

    if let Err(message) = check_arguments(&args) {
        eprintln!("error: {}", message);
        return usage_failure();
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!("Fatal: {}", e);
            usage_failure()
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// Cross-argument checks clap cannot express
fn check_arguments(args: &Args) -> Result<(), String> {
    let fleet_size = args.num_robots as usize;
    if args.robot_id >= fleet_size {
        return Err(format!(
            "ROBOT_NUM_ID ({}) must be below NUM_ROBOTS ({})",
            args.robot_id, fleet_size
        ));
    }
    if !args.goal_x.is_finite() || !args.goal_y.is_finite() {
        return Err(format!(
            "GOAL_X and GOAL_Y must be finite, got ({}, {})",
            args.goal_x, args.goal_y
        ));
    }
    Ok(())
}

fn usage_failure() -> ExitCode {
    eprintln!("\n{}", Args::command().render_usage());
    ExitCode::FAILURE
}

fn run(args: Args) -> Result<(), PotFieldError> {
    let mut config = match &args.config {
        Some(path) => PotFieldConfig::load(path)?,
        None => PotFieldConfig::default(),
    };
    if let Some(rate) = args.rate {
        config.control.frequency_hz = rate;
    }
    if args.max_ticks.is_some() {
        config.control.max_ticks = args.max_ticks;
    }
    config.validate()?;

    let robot = RobotConfig::new(
        args.robot_id,
        args.num_robots as usize,
        Goal::new(args.goal_x, args.goal_y),
        &config.mapper,
    )?;

    let (feed, inbox) = observation_channel();
    let sink = JsonLinesSink::new(std::io::stdout());
    let mut control = ControlLoop::new(robot, &config, inbox, sink)?;

    let stop = control.stop_handle();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping after the current tick");
        stop.stop();
    })
    .map_err(|e| PotFieldError::Config(format!("cannot install Ctrl+C handler: {}", e)))?;

    // The reader thread is the only writer into the inbox; it is left to die
    // with the process since stdin reads cannot be interrupted.
    let _reader = spawn_json_lines_reader(BufReader::new(std::io::stdin()), feed);

    control.run()
}
