//! RGB color type and the tagged color-input union

use std::fmt;

use thiserror::Error;

/// Errors raised while constructing colors
#[derive(Error, Debug)]
pub enum ColorError {
    #[error("one or more channels are below 0 or above 255 (given {red}, {green}, {blue})")]
    ChannelRange { red: i32, green: i32, blue: i32 },
}

/// An RGB triple. Each channel is 0-255 by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// All channels off
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const BLACK: Rgb = Rgb::OFF;

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Checked construction from wider integers, for caller-supplied values.
    pub fn from_channels(red: i32, green: i32, blue: i32) -> Result<Self, ColorError> {
        let in_range = |v: i32| (0..=255).contains(&v);
        if !(in_range(red) && in_range(green) && in_range(blue)) {
            return Err(ColorError::ChannelRange { red, green, blue });
        }
        Ok(Self::new(red as u8, green as u8, blue as u8))
    }

    /// Channel-wise complement, for devices wired with inverted polarity.
    pub const fn invert(self) -> Self {
        Self::new(255 - self.red, 255 - self.green, 255 - self.blue)
    }

    pub const fn is_off(self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// The handful of colors callers may address by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Off,
    Black,
    Red,
    Green,
    Blue,
    White,
    Yellow,
    Purple,
}

impl NamedColor {
    pub const fn rgb(self) -> Rgb {
        match self {
            NamedColor::Off | NamedColor::Black => Rgb::OFF,
            NamedColor::Red => Rgb::new(0xff, 0x00, 0x00),
            NamedColor::Green => Rgb::new(0x00, 0xff, 0x00),
            NamedColor::Blue => Rgb::new(0x00, 0x00, 0xff),
            NamedColor::White => Rgb::new(0xff, 0xff, 0xff),
            NamedColor::Yellow => Rgb::new(0xff, 0xff, 0x00),
            NamedColor::Purple => Rgb::new(0x80, 0x00, 0x80),
        }
    }
}

/// Color input accepted by the single set-color entry point.
///
/// Resolved by an explicit match instead of overloaded setters, so every
/// caller goes through the same validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpec {
    Named(NamedColor),
    Channels { red: i32, green: i32, blue: i32 },
    Exact(Rgb),
}

impl ColorSpec {
    /// Resolve the input to a concrete triple.
    pub fn resolve(self) -> Result<Rgb, ColorError> {
        match self {
            ColorSpec::Named(name) => Ok(name.rgb()),
            ColorSpec::Channels { red, green, blue } => Rgb::from_channels(red, green, blue),
            ColorSpec::Exact(rgb) => Ok(rgb),
        }
    }
}

impl From<Rgb> for ColorSpec {
    fn from(rgb: Rgb) -> Self {
        ColorSpec::Exact(rgb)
    }
}

impl From<NamedColor> for ColorSpec {
    fn from(name: NamedColor) -> Self {
        ColorSpec::Named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_in_range() {
        let rgb = Rgb::from_channels(10, 20, 30).unwrap();
        assert_eq!(rgb, Rgb::new(10, 20, 30));
    }

    #[test]
    fn test_from_channels_out_of_range() {
        assert!(Rgb::from_channels(-1, 0, 0).is_err());
        assert!(Rgb::from_channels(0, 256, 0).is_err());
        assert!(Rgb::from_channels(0, 0, 1000).is_err());
    }

    #[test]
    fn test_invert() {
        assert_eq!(Rgb::new(255, 0, 10).invert(), Rgb::new(0, 255, 245));
        assert_eq!(Rgb::OFF.invert(), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(NamedColor::Red.rgb(), Rgb::new(255, 0, 0));
        assert_eq!(NamedColor::Off.rgb(), Rgb::OFF);
        assert_eq!(NamedColor::Black.rgb(), Rgb::OFF);
    }

    #[test]
    fn test_spec_resolution() {
        assert_eq!(
            ColorSpec::Named(NamedColor::Yellow).resolve().unwrap(),
            Rgb::new(255, 255, 0)
        );
        assert_eq!(
            ColorSpec::Channels { red: 1, green: 2, blue: 3 }.resolve().unwrap(),
            Rgb::new(1, 2, 3)
        );
        assert!(ColorSpec::Channels { red: 300, green: 0, blue: 0 }.resolve().is_err());
        let exact = Rgb::new(9, 9, 9);
        assert_eq!(ColorSpec::Exact(exact).resolve().unwrap(), exact);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rgb::new(255, 0, 0).to_string(), "RGB(255, 0, 0)");
    }
}
