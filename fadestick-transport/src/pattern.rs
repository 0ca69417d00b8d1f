//! Color/duration sequences and their fixed-buffer encoding
//!
//! A pattern is played back autonomously by the device: the host uploads the
//! whole sequence in one transfer and the firmware walks the steps on its own
//! clock. The buffer layout is `[count, (R, G, B, duration-units) x count]`
//! zero-padded to [`PATTERN_BUFFER_BYTES`].

use thiserror::Error;
use tracing::warn;

use crate::color::Rgb;
use crate::protocol::PATTERN_BUFFER_BYTES;

/// Durations are quantized to this resolution on the wire.
pub const DURATION_UNIT_MS: u16 = 10;

/// Longest step duration expressible in one wire byte.
pub const MAX_STEP_MS: u16 = 255 * DURATION_UNIT_MS;

/// Hard cap on steps in one pattern, imposed by the device buffer:
/// one count byte plus four bytes per step.
pub const MAX_PATTERN_STEPS: usize = (PATTERN_BUFFER_BYTES - 2) / 4;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("duration {0}ms out of range [1, {MAX_STEP_MS}]")]
    DurationRange(u16),
}

/// Quantize a millisecond duration to wire units, rounding half-up.
fn quantize(ms: u16) -> u8 {
    ((ms + DURATION_UNIT_MS / 2) / DURATION_UNIT_MS) as u8
}

/// One step of a pattern: hold `color` for `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorDuration {
    color: Rgb,
    duration_ms: u16,
}

impl ColorDuration {
    /// Caller-facing construction; the duration must be in [1, 2550] ms.
    pub fn new(color: Rgb, duration_ms: u16) -> Result<Self, PatternError> {
        if duration_ms < 1 || duration_ms > MAX_STEP_MS {
            return Err(PatternError::DurationRange(duration_ms));
        }
        Ok(Self { color, duration_ms })
    }

    /// The zero-length OFF entry that closes a blink sequence. Only the
    /// pattern builder itself may produce a zero duration.
    pub(crate) const fn off_terminator() -> Self {
        Self { color: Rgb::OFF, duration_ms: 0 }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn duration_ms(&self) -> u16 {
        self.duration_ms
    }
}

/// An ordered, bounded sequence of color/duration steps.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    steps: Vec<ColorDuration>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step. Once the device buffer is full further steps are
    /// dropped with a warning; truncation is lossy, never an error.
    pub fn add_step(&mut self, color: Rgb, duration_ms: u16) -> Result<(), PatternError> {
        self.push(ColorDuration::new(color, duration_ms)?);
        Ok(())
    }

    /// Close the sequence with a zero-duration OFF entry so playback ends
    /// with the LED dark.
    pub fn add_off_terminator(&mut self) {
        self.push(ColorDuration::off_terminator());
    }

    fn push(&mut self, step: ColorDuration) {
        if self.steps.len() >= MAX_PATTERN_STEPS {
            warn!(
                "pattern buffer holds at most {MAX_PATTERN_STEPS} steps; dropping ({}, {}ms)",
                step.color(),
                step.duration_ms()
            );
            return;
        }
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ColorDuration] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Serialize into the device's fixed buffer: count byte, then four bytes
    /// per step, zero-padded to exactly [`PATTERN_BUFFER_BYTES`].
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PATTERN_BUFFER_BYTES];
        buf[0] = self.steps.len() as u8;
        for (i, step) in self.steps.iter().enumerate() {
            let at = 1 + i * 4;
            let color = step.color();
            buf[at] = color.red;
            buf[at + 1] = color.green;
            buf[at + 2] = color.blue;
            buf[at + 3] = quantize(step.duration_ms());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const GREEN: Rgb = Rgb::new(0, 255, 0);

    #[test]
    fn test_color_duration_bounds() {
        assert!(ColorDuration::new(RED, 0).is_err());
        assert!(ColorDuration::new(RED, 2551).is_err());
        assert_eq!(ColorDuration::new(RED, 1).unwrap().duration_ms(), 1);
        assert_eq!(ColorDuration::new(RED, 2550).unwrap().duration_ms(), 2550);
        assert_eq!(ColorDuration::new(RED, 100).unwrap().duration_ms(), 100);
    }

    #[test]
    fn test_add_steps_in_order() {
        let mut p = Pattern::new();
        p.add_step(RED, 100).unwrap();
        p.add_step(GREEN, 200).unwrap();
        let held: Vec<_> = p.steps().iter().map(|s| (s.color(), s.duration_ms())).collect();
        assert_eq!(held, vec![(RED, 100), (GREEN, 200)]);
    }

    #[test]
    fn test_saturates_at_buffer_capacity() {
        let mut p = Pattern::new();
        for _ in 0..MAX_PATTERN_STEPS + 10 {
            p.add_step(RED, 100).unwrap();
        }
        assert_eq!(p.len(), MAX_PATTERN_STEPS);
        // Entries that made it in are intact.
        assert!(p.steps().iter().all(|s| s.color() == RED && s.duration_ms() == 100));
        assert_eq!(p.encode()[0], MAX_PATTERN_STEPS as u8);
    }

    #[test]
    fn test_encode_empty() {
        let p = Pattern::new();
        assert_eq!(p.encode(), vec![0u8; PATTERN_BUFFER_BYTES]);
    }

    #[test]
    fn test_encode_layout() {
        let mut p = Pattern::new();
        p.add_step(RED, 100).unwrap();
        p.add_step(GREEN, 100).unwrap();
        let buf = p.encode();
        assert_eq!(buf.len(), PATTERN_BUFFER_BYTES);
        assert_eq!(&buf[..9], &[2, 255, 0, 0, 10, 0, 255, 0, 10]);
        assert!(buf[9..].iter().all(|&b| b == 0));
    }

    // Quantization is round-half-up to the nearest 10ms.
    #[test]
    fn test_duration_quantization() {
        let cases = [(100u16, 10u8), (9, 1), (5, 1), (4, 0), (1, 0), (2550, 255)];
        for (ms, unit) in cases {
            let mut p = Pattern::new();
            p.add_step(RED, ms).unwrap();
            assert_eq!(p.encode()[4], unit, "{ms}ms should quantize to {unit}");
        }
    }

    #[test]
    fn test_off_terminator() {
        let mut p = Pattern::new();
        p.add_step(RED, 500).unwrap();
        p.add_off_terminator();
        let last = p.steps().last().unwrap();
        assert_eq!(last.color(), Rgb::OFF);
        assert_eq!(last.duration_ms(), 0);
    }
}
