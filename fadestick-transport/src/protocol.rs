//! Wire constants and report codecs for the FadeStick control-transfer protocol

use std::time::Duration;

use crate::color::Rgb;
use crate::error::TransportError;

/// USB vendor ID shared by all FadeStick devices
pub const VENDOR_ID: u16 = 0x20a0;
/// USB product ID shared by all FadeStick devices
pub const PRODUCT_ID: u16 = 0x41e5;

/// The interface carrying the vendor reports
pub const INTERFACE: u8 = 0;

/// Default timeout for a single control transfer
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// bmRequestType values (direction | type | recipient)
pub mod request_type {
    /// Host-to-device report write
    pub const OUT: u8 = 0x20;
    /// Device-to-host report read
    pub const IN: u8 = 0x80 | 0x20;
}

/// bRequest values
pub mod request {
    pub const SET_REPORT: u8 = 0x09;
    pub const GET_REPORT: u8 = 0x01;
}

/// Report numbers (wValue of the control transfer)
pub mod report {
    /// Immediate color register
    pub const COLOR: u16 = 0x0001;
    /// Pattern playback buffer
    pub const PATTERN: u16 = 0x0002;
}

/// Length of the block returned by an immediate-color read.
/// Bytes 1-3 carry R, G, B; the rest is firmware state we ignore.
pub const COLOR_REPORT_LEN: usize = 33;

/// Capacity of the device's fixed pattern buffer: a 255-byte report minus
/// the two protocol header bytes.
pub const PATTERN_BUFFER_BYTES: usize = 255 - 2;

/// A pattern transfer carries the report byte plus the encoded buffer.
pub const PATTERN_REPORT_LEN: usize = PATTERN_BUFFER_BYTES + 1;

/// Build the immediate-color write payload: `[mode, R, G, B]` with mode 0.
pub fn encode_color_report(rgb: Rgb) -> [u8; 4] {
    [0, rgb.red, rgb.green, rgb.blue]
}

/// Extract the triple from an immediate-color read block.
pub fn decode_color_report(block: &[u8]) -> Result<Rgb, TransportError> {
    if block.len() < 4 {
        return Err(TransportError::MalformedResponse(block.len()));
    }
    Ok(Rgb::new(block[1], block[2], block[3]))
}

/// Step count stored in a pattern read block. Zero means the playback
/// buffer is empty and the device is idle.
pub fn decode_pattern_count(block: &[u8]) -> Result<u8, TransportError> {
    if block.len() < 2 {
        return Err(TransportError::MalformedResponse(block.len()));
    }
    Ok(block[1])
}
