use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::serial::{open_serial, DEFAULT_SPEED};
use crate::traits::{DeviceStream, ReadTimeout};

/// Prefix selecting a Unix domain socket instead of a serial port.
pub const UNIX_PREFIX: &str = "unix:";

/// Where the device lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    /// A serial port path such as `/dev/ttyACM0`.
    Serial(String),
    /// A Unix domain socket path, written `unix:<path>`.
    Unix(PathBuf),
}

impl FromStr for DeviceTarget {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidTarget(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if s.is_empty() {
            return Err(TransportError::InvalidTarget(s.to_string()));
        }
        Ok(Self::Serial(s.to_string()))
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => f.write_str(path),
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

/// Configuration for opening the device channel.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Serial line speed in bits per second. Ignored for sockets.
    pub speed: u32,
    /// Read timeout applied right after opening. `None` blocks.
    pub read_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            read_timeout: None,
        }
    }
}

/// Open the channel to `target`.
pub fn open(target: &DeviceTarget, config: &TransportConfig) -> Result<DeviceStream> {
    let mut stream = match target {
        DeviceTarget::Serial(path) => open_serial(path, config.speed)?,
        #[cfg(unix)]
        DeviceTarget::Unix(path) => crate::uds::UnixDomainSocket::connect(path)?,
        #[cfg(not(unix))]
        DeviceTarget::Unix(path) => {
            return Err(TransportError::Connect {
                path: path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            })
        }
    };
    stream.set_read_timeout(config.read_timeout)?;
    Ok(stream)
}
