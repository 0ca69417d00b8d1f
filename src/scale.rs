//! Mapping a busy fraction onto the green-yellow-red load ramp

use fadestick_transport::Rgb;

/// Map a busy fraction to a color: green when idle, yellow at half load,
/// red when saturated. Input outside [0, 1] is clamped first.
pub fn scale_to_rgb(fraction: f64) -> Rgb {
    let f = fraction.clamp(0.0, 1.0);
    let red = (510.0 * f).round().min(255.0) as u8;
    let green = (510.0 * (1.0 - f)).round().min(255.0) as u8;
    Rgb::new(red, green, 0)
}
