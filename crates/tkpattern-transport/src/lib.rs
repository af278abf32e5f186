//! Byte channel to a TKey.
//!
//! Provides a unified `Read + Write` stream over the ways a host reaches the
//! device:
//! - USB CDC serial ports (the physical key)
//! - Unix domain sockets (emulators and the bundled device simulator)
//!
//! This is the lowest layer of tkpattern. Framing and the device protocol
//! build on top of the [`DeviceStream`] type provided here.

pub mod error;
pub mod serial;
pub mod target;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use serial::{detect_serial_port, DEFAULT_SPEED, TKEY_PID, TKEY_VID};
pub use target::{open, DeviceTarget, TransportConfig};
pub use traits::{DeviceStream, ReadTimeout};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
