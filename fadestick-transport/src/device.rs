//! The device channel: control transfers with one-shot reconnect recovery

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, warn};

use crate::color::Rgb;
use crate::error::TransportError;
use crate::pattern::Pattern;
use crate::protocol::{self, report, request, request_type};
use crate::{discovery, Transport};

/// An open FadeStick.
///
/// Owns the USB handle, the serial number it was opened under, and the
/// inverse-wiring flag. A handle that fails a transfer is never reused as-is:
/// recovery swaps in a freshly located handle or the operation fails with
/// [`TransportError::Disconnected`].
pub struct FadeStick {
    handle: DeviceHandle<GlobalContext>,
    serial: String,
    inverse: bool,
}

impl FadeStick {
    /// Open a device found by discovery: detach any competing kernel driver
    /// claim on the report interface, claim it, and cache the serial string.
    pub(crate) fn open(device: rusb::Device<GlobalContext>) -> Result<Self, TransportError> {
        let descriptor = device.device_descriptor()?;
        let mut handle = device.open()?;
        if handle.kernel_driver_active(protocol::INTERFACE)? {
            handle
                .detach_kernel_driver(protocol::INTERFACE)
                .map_err(TransportError::KernelDriver)?;
        }
        handle.claim_interface(protocol::INTERFACE)?;
        let serial = handle.read_serial_number_string_ascii(&descriptor)?;
        debug!("opened FadeStick {serial}");
        Ok(Self { handle, serial, inverse: false })
    }

    /// Treat channel values as bit-inverted on the wire.
    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn inverse(&self) -> bool {
        self.inverse
    }

    /// Replace a failed handle by re-locating the device under its cached
    /// serial. Called at most once per operation so a permanently removed
    /// device cannot recurse.
    fn reacquire(&mut self, cause: rusb::Error) -> Result<(), TransportError> {
        warn!("transfer to FadeStick {} failed ({cause}); rescanning", self.serial);
        match discovery::find_by_serial(&self.serial)? {
            Some(fresh) => {
                self.handle = fresh.handle;
                debug!("re-acquired FadeStick {}", self.serial);
                Ok(())
            }
            None => Err(TransportError::Disconnected { serial: self.serial.clone() }),
        }
    }

    fn control_out(&mut self, value: u16, data: &[u8]) -> Result<(), TransportError> {
        if let Err(cause) = self.handle.write_control(
            request_type::OUT,
            request::SET_REPORT,
            value,
            0,
            data,
            protocol::CONTROL_TIMEOUT,
        ) {
            self.reacquire(cause)?;
            self.handle.write_control(
                request_type::OUT,
                request::SET_REPORT,
                value,
                0,
                data,
                protocol::CONTROL_TIMEOUT,
            )?;
        }
        Ok(())
    }

    fn control_in(&mut self, value: u16, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.handle.read_control(
            request_type::IN,
            request::GET_REPORT,
            value,
            0,
            buf,
            protocol::CONTROL_TIMEOUT,
        ) {
            Ok(n) => Ok(n),
            Err(cause) => {
                self.reacquire(cause)?;
                Ok(self.handle.read_control(
                    request_type::IN,
                    request::GET_REPORT,
                    value,
                    0,
                    buf,
                    protocol::CONTROL_TIMEOUT,
                )?)
            }
        }
    }
}

impl Transport for FadeStick {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn set_color_immediate(&mut self, rgb: Rgb) -> Result<(), TransportError> {
        let wire = if self.inverse { rgb.invert() } else { rgb };
        self.control_out(report::COLOR, &protocol::encode_color_report(wire))
    }

    fn get_color(&mut self) -> Result<Rgb, TransportError> {
        let mut block = [0u8; protocol::COLOR_REPORT_LEN];
        let n = self.control_in(report::COLOR, &mut block)?;
        let rgb = protocol::decode_color_report(&block[..n])?;
        Ok(if self.inverse { rgb.invert() } else { rgb })
    }

    fn send_pattern(&mut self, pattern: &Pattern) -> Result<(), TransportError> {
        let mut payload = Vec::with_capacity(protocol::PATTERN_REPORT_LEN);
        payload.push(report::PATTERN as u8);
        payload.extend_from_slice(&pattern.encode());
        self.control_out(report::PATTERN, &payload)
    }

    fn is_idle(&mut self) -> Result<bool, TransportError> {
        let mut block = [0u8; protocol::PATTERN_REPORT_LEN];
        let n = self.control_in(report::PATTERN, &mut block)?;
        Ok(protocol::decode_pattern_count(&block[..n])? == 0)
    }
}
