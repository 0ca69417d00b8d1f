//! Transport layer for FadeStick USB RGB LED devices
//!
//! This crate owns everything below the effect level:
//!
//! - the wire protocol (vendor control transfers, report codecs)
//! - pattern sequences and their fixed-buffer encoding
//! - device discovery and the resilient device channel
//!
//! The protocol modules ([`color`], [`pattern`], [`protocol`]) carry no
//! dependency on the device layer; [`FadeStick`] sits on top of them.

pub mod color;
pub mod error;
pub mod pattern;
pub mod protocol;

pub mod discovery;
mod device;

pub use color::{ColorError, ColorSpec, NamedColor, Rgb};
pub use device::FadeStick;
pub use error::TransportError;
pub use pattern::{ColorDuration, Pattern, PatternError, MAX_PATTERN_STEPS, MAX_STEP_MS};

/// The primitives every device channel provides.
///
/// Implemented once by [`FadeStick`]; effect code is written against the
/// trait so it can be exercised without hardware.
pub trait Transport {
    /// Serial number the device was opened under
    fn serial(&self) -> &str;

    /// Set the LED color with a single small transfer
    fn set_color_immediate(&mut self, rgb: Rgb) -> Result<(), TransportError>;

    /// Read back the last immediate color. Not meaningful while the device
    /// is playing a pattern.
    fn get_color(&mut self) -> Result<Rgb, TransportError>;

    /// Upload a whole pattern in one transfer; the device plays it back
    /// autonomously without further host interaction.
    fn send_pattern(&mut self, pattern: &Pattern) -> Result<(), TransportError>;

    /// Whether the pattern playback buffer is empty
    fn is_idle(&mut self) -> Result<bool, TransportError>;

    fn turn_off(&mut self) -> Result<(), TransportError> {
        self.set_color_immediate(Rgb::OFF)
    }

    /// Dark and not playing anything
    fn is_off(&mut self) -> Result<bool, TransportError> {
        Ok(self.is_idle()? && self.get_color()?.is_off())
    }
}
