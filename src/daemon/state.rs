//! State shared between the polling loop and the status handler

use std::sync::{Arc, Mutex};

use fadestick_transport::Rgb;

#[derive(Debug, Default)]
struct Inner {
    cpu_fraction: f64,
    current_color: Rgb,
    device_present: bool,
    running: bool,
}

/// Daemon-wide state behind one lock.
///
/// Fields are reachable only through these accessors, each of which takes
/// the lock internally and holds it just long enough to copy data — no
/// device I/O ever happens under the lock.
#[derive(Clone, Default)]
pub struct SharedState(Arc<Mutex<Inner>>);

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.0.lock().unwrap().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.0.lock().unwrap().running
    }

    pub fn set_device_present(&self, present: bool) {
        self.0.lock().unwrap().device_present = present;
    }

    pub fn device_present(&self) -> bool {
        self.0.lock().unwrap().device_present
    }

    pub fn set_load(&self, fraction: f64, color: Rgb) {
        let mut inner = self.0.lock().unwrap();
        inner.cpu_fraction = fraction;
        inner.current_color = color;
    }

    pub fn load(&self) -> (f64, Rgb) {
        let inner = self.0.lock().unwrap();
        (inner.cpu_fraction, inner.current_color)
    }

    /// The human-readable summary sent over the status pipe, built under a
    /// single lock acquisition.
    pub fn status_line(&self) -> String {
        let inner = self.0.lock().unwrap();
        if !inner.device_present {
            "Daemon running, but FadeStick not present.".to_string()
        } else {
            format!(
                "Daemon running. Current CPU load is {:.2}% and is color {}.",
                inner.cpu_fraction * 100.0,
                inner.current_color
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = SharedState::new();
        assert!(!state.is_running());
        assert!(!state.device_present());
        assert_eq!(state.load(), (0.0, Rgb::OFF));
    }

    #[test]
    fn test_status_line_without_device() {
        let state = SharedState::new();
        state.set_running(true);
        assert_eq!(state.status_line(), "Daemon running, but FadeStick not present.");
    }

    #[test]
    fn test_status_line_with_device() {
        let state = SharedState::new();
        state.set_running(true);
        state.set_device_present(true);
        state.set_load(0.1234, Rgb::new(63, 192, 0));
        assert_eq!(
            state.status_line(),
            "Daemon running. Current CPU load is 12.34% and is color RGB(63, 192, 0)."
        );
    }

    #[test]
    fn test_clones_share_state() {
        let state = SharedState::new();
        let other = state.clone();
        state.set_device_present(true);
        assert!(other.device_present());
    }
}
