//! Locating FadeStick devices on the bus

use tracing::{debug, info};

use crate::device::FadeStick;
use crate::error::TransportError;
use crate::protocol::{PRODUCT_ID, VENDOR_ID};
use crate::Transport;

fn matching_devices() -> Result<Vec<rusb::Device<rusb::GlobalContext>>, TransportError> {
    let devices = rusb::devices()?
        .iter()
        .filter(|d| {
            d.device_descriptor()
                .map(|desc| desc.vendor_id() == VENDOR_ID && desc.product_id() == PRODUCT_ID)
                .unwrap_or(false)
        })
        .collect();
    Ok(devices)
}

/// Open every FadeStick on the bus. Devices that cannot be opened (e.g.
/// permissions) are skipped with a log line.
pub fn find_all() -> Result<Vec<FadeStick>, TransportError> {
    let mut found = Vec::new();
    for device in matching_devices()? {
        match FadeStick::open(device) {
            Ok(fs) => found.push(fs),
            Err(e) => debug!("skipping unopenable device: {e}"),
        }
    }
    info!("found {} FadeStick device(s)", found.len());
    Ok(found)
}

/// Open the first FadeStick on the bus.
pub fn find_first() -> Result<FadeStick, TransportError> {
    for device in matching_devices()? {
        match FadeStick::open(device) {
            Ok(fs) => return Ok(fs),
            Err(e) => debug!("skipping unopenable device: {e}"),
        }
    }
    Err(TransportError::NotFound)
}

/// Open the FadeStick carrying the given serial, if it is present.
pub fn find_by_serial(serial: &str) -> Result<Option<FadeStick>, TransportError> {
    for device in matching_devices()? {
        match FadeStick::open(device) {
            Ok(fs) if fs.serial() == serial => return Ok(Some(fs)),
            Ok(fs) => debug!("serial {} does not match, continuing", fs.serial()),
            Err(e) => debug!("skipping unopenable device: {e}"),
        }
    }
    Ok(None)
}
