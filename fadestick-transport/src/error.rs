//! Transport error types

use thiserror::Error;

/// Errors that can occur while talking to a FadeStick
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no FadeStick devices found")]
    NotFound,

    #[error("could not communicate with FadeStick {serial} - it may have been removed")]
    Disconnected { serial: String },

    #[error("could not detach USB kernel driver: {0}")]
    KernelDriver(rusb::Error),

    #[error("malformed device response ({0} bytes)")]
    MalformedResponse(usize),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}
