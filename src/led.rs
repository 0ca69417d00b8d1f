//! LED effects: blink, morph, pulse
//!
//! Effects are compiled into a single [`Pattern`] transfer wherever possible
//! so the device times the sequence itself and the host does not sleep
//! between intermediate colors.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use fadestick_transport::{
    ColorError, ColorSpec, Pattern, PatternError, Rgb, Transport, TransportError,
    MAX_PATTERN_STEPS, MAX_STEP_MS,
};

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("{name} {value} out of range [{min}, {max}]")]
    Range { name: &'static str, value: u16, min: u16, max: u16 },

    #[error(transparent)]
    Color(#[from] ColorError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Bounds for effect parameters.
///
/// One effect engine parameterized by limits, rather than a device subclass
/// per variant; the defaults describe the stock firmware.
#[derive(Debug, Clone)]
pub struct EffectLimits {
    pub max_blinks: u16,
    pub max_pulses: u16,
    pub max_delay_ms: u16,
    pub max_duration_ms: u16,
    pub max_steps: u16,
}

impl Default for EffectLimits {
    fn default() -> Self {
        Self {
            max_blinks: 100,
            max_pulses: 100,
            max_delay_ms: MAX_STEP_MS,
            max_duration_ms: MAX_STEP_MS,
            max_steps: MAX_PATTERN_STEPS as u16,
        }
    }
}

fn check(name: &'static str, value: u16, min: u16, max: u16) -> Result<(), EffectError> {
    if value < min || value > max {
        return Err(EffectError::Range { name, value, min, max });
    }
    Ok(())
}

/// Effect engine over any device channel.
pub struct Effects<T: Transport> {
    channel: T,
    limits: EffectLimits,
}

impl<T: Transport> Effects<T> {
    pub fn new(channel: T, limits: EffectLimits) -> Self {
        Self { channel, limits }
    }

    pub fn channel(&self) -> &T {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut T {
        &mut self.channel
    }

    /// Set the LED immediately from any accepted color input.
    pub fn set_color(&mut self, input: impl Into<ColorSpec>) -> Result<Rgb, EffectError> {
        let rgb = input.into().resolve()?;
        self.channel.set_color_immediate(rgb)?;
        Ok(rgb)
    }

    pub fn turn_off(&mut self) -> Result<(), EffectError> {
        Ok(self.channel.turn_off()?)
    }

    pub fn is_off(&mut self) -> Result<bool, EffectError> {
        Ok(self.channel.is_off()?)
    }

    /// Fade from the current color to `end` over `duration_ms`, interpolated
    /// linearly in `steps` entries and uploaded as one pattern.
    ///
    /// The last entry is `end` exactly; intermediate rounding never drifts
    /// past it. Parameters are validated before any device I/O.
    pub fn morph_to(&mut self, end: Rgb, duration_ms: u16, steps: u16) -> Result<(), EffectError> {
        check("steps", steps, 1, self.limits.max_steps)?;
        check("duration_ms", duration_ms, 1, self.limits.max_duration_ms)?;

        let start = self.channel.get_color()?;
        // A legal morph never produces an illegal step, so the per-step
        // duration is floored at 1ms.
        let step_ms = (duration_ms / steps).max(1);

        let mut pattern = Pattern::new();
        for n in 1..=steps {
            let d = f64::from(n) / f64::from(steps);
            let lerp = |a: u8, b: u8| (f64::from(a) * (1.0 - d) + f64::from(b) * d).round() as u8;
            let color = Rgb::new(
                lerp(start.red, end.red),
                lerp(start.green, end.green),
                lerp(start.blue, end.blue),
            );
            pattern.add_step(color, step_ms)?;
        }
        debug!("morph {start} -> {end} in {steps} steps of {step_ms}ms");
        self.channel.send_pattern(&pattern)?;
        Ok(())
    }

    /// Flash `color` against dark `blinks` times with `delay_ms` between
    /// edges, as one pattern ending dark.
    pub fn blink(&mut self, color: Rgb, blinks: u16, delay_ms: u16) -> Result<(), EffectError> {
        check("blinks", blinks, 1, self.limits.max_blinks)?;
        check("delay_ms", delay_ms, 1, self.limits.max_delay_ms)?;

        let mut pattern = Pattern::new();
        for n in 0..blinks {
            if n > 0 {
                pattern.add_step(Rgb::OFF, delay_ms)?;
            }
            pattern.add_step(color, delay_ms)?;
        }
        pattern.add_off_terminator();
        self.channel.send_pattern(&pattern)?;
        Ok(())
    }

    /// Breathe `color` `pulses` times: fade up then back to dark, pacing the
    /// host to the device's playback so consecutive fades do not clobber
    /// each other.
    pub fn pulse(
        &mut self,
        color: Rgb,
        pulses: u16,
        duration_ms: u16,
        steps: u16,
    ) -> Result<(), EffectError> {
        check("pulses", pulses, 1, self.limits.max_pulses)?;
        check("steps", steps, 1, self.limits.max_steps)?;
        check("duration_ms", duration_ms, 1, self.limits.max_duration_ms)?;

        self.channel.turn_off()?;
        for _ in 0..pulses {
            self.morph_to(color, duration_ms, steps)?;
            thread::sleep(Duration::from_millis(u64::from(duration_ms)));
            self.morph_to(Rgb::OFF, duration_ms, steps)?;
            thread::sleep(Duration::from_millis(u64::from(duration_ms)));
        }
        Ok(())
    }
}
