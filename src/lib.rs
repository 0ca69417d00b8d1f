//! FadeStick CPU load indicator
//!
//! Samples the machine's CPU load and drives a FadeStick USB RGB LED
//! through a green-yellow-red ramp, as a singleton background daemon.
//! USB plumbing lives in the `fadestick-transport` crate; this crate adds
//! load sampling, the load-to-color scale, the LED effect engine and the
//! daemon supervisor.

pub mod cpu;
pub mod daemon;
pub mod led;
pub mod scale;

pub use daemon::{Daemon, DaemonConfig, DaemonError};
pub use led::{EffectError, EffectLimits, Effects};
