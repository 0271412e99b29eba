//! Transport boundary for the controller
//!
//! This module holds everything that touches the outside world:
//! - Receiving pose and range-scan observations
//! - Publishing velocity commands
//!
//! The middleware itself is not part of the crate. A JSON-lines reader and
//! writer are provided so the binary can be driven over stdin/stdout.

mod publisher;
mod subscriber;

pub use publisher::*;
pub use subscriber::*;
