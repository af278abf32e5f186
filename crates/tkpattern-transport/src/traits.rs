use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::Result;

/// Serial drivers take a concrete timeout; this stands in for "block forever".
pub(crate) const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Streams whose blocking reads can be bounded.
///
/// The device protocol shortens the read timeout while probing whether a
/// device is present at all, then restores blocking reads.
pub trait ReadTimeout {
    /// Set the read timeout. `None` blocks until data arrives.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;
}

/// A connected device channel; implements Read + Write.
///
/// Wraps either a serial port (the physical key) or a Unix domain socket
/// stream (emulator or simulator).
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Serial(Box<dyn SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl ReadTimeout for DeviceStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }
}

impl DeviceStream {
    pub(crate) fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: DeviceStreamInner::Serial(port),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DeviceStreamInner::Unix(stream),
        }
    }

    /// Try to clone this stream (a second handle on the same channel).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            DeviceStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Short transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            DeviceStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            DeviceStreamInner::Unix(_) => "unix",
        }
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            DeviceStreamInner::Serial(port) => f
                .debug_struct("DeviceStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            DeviceStreamInner::Unix(_) => {
                f.debug_struct("DeviceStream").field("type", &"unix").finish()
            }
        }
    }
}
