use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{DeviceStream, SERIAL_BLOCKING_TIMEOUT};

/// Default line speed of the TKey CDC interface, in bits per second.
pub const DEFAULT_SPEED: u32 = 62_500;

/// USB vendor ID of the TKey.
pub const TKEY_VID: u16 = 0x1207;

/// USB product ID of the TKey.
pub const TKEY_PID: u16 = 0x8887;

/// Open a serial port at the given speed with blocking reads.
pub fn open_serial(path: &str, speed: u32) -> Result<DeviceStream> {
    let port = serialport::new(path, speed)
        .timeout(SERIAL_BLOCKING_TIMEOUT)
        .open()
        .map_err(|source| TransportError::Open {
            path: path.to_string(),
            source,
        })?;
    info!(path, speed, "opened serial port");
    Ok(DeviceStream::from_serial(port))
}

/// Find the serial port of the single attached TKey.
///
/// Fails when no TKey is attached, or when more than one is, since picking
/// one silently would talk to the wrong device half of the time.
pub fn detect_serial_port() -> Result<String> {
    let ports = serialport::available_ports()?;
    debug!(count = ports.len(), "enumerated serial ports");
    select_tkey_port(ports)
}

fn select_tkey_port(ports: Vec<SerialPortInfo>) -> Result<String> {
    let mut found: Vec<String> = ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == TKEY_VID && usb.pid == TKEY_PID => {
                Some(port.port_name)
            }
            _ => None,
        })
        .collect();

    match found.len() {
        0 => Err(TransportError::NoDevice),
        1 => {
            let port = found.remove(0);
            info!(port = %port, "auto-detected TKey");
            Ok(port)
        }
        _ => Err(TransportError::MultipleDevices(found)),
    }
}
