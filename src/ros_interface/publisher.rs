// src/ros_interface/publisher.rs
// Velocity command output. The sink only ever has to honour the newest
// command; older ones are superseded, never replayed.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use crate::error::PotFieldError;
use crate::navigation::VelocityCommand;

/// Destination for velocity commands (e.g. a cmd_vel topic)
#[cfg_attr(test, mockall::automock)]
pub trait CommandSink {
    fn publish(&mut self, command: VelocityCommand) -> Result<(), PotFieldError>;
}

/// Depth-one command slot: each publish replaces the previous command.
/// Clones share the slot, so a test or a driver thread can read what the
/// loop wrote.
#[derive(Debug, Clone, Default)]
pub struct LatestCommandSink {
    inner: Arc<Mutex<LatestSlot>>,
}

#[derive(Debug, Default)]
struct LatestSlot {
    command: Option<VelocityCommand>,
    published: u64,
}

impl LatestCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent command, if any was published
    pub fn latest(&self) -> Option<VelocityCommand> {
        self.inner.lock().command
    }

    /// Number of commands published so far
    pub fn published(&self) -> u64 {
        self.inner.lock().published
    }
}

impl CommandSink for LatestCommandSink {
    fn publish(&mut self, command: VelocityCommand) -> Result<(), PotFieldError> {
        let mut slot = self.inner.lock();
        slot.command = Some(command);
        slot.published += 1;
        Ok(())
    }
}

/// Writes each command as one JSON line, flushing immediately
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CommandSink for JsonLinesSink<W> {
    fn publish(&mut self, command: VelocityCommand) -> Result<(), PotFieldError> {
        serde_json::to_writer(&mut self.writer, &command)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
