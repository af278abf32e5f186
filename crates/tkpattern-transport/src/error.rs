use std::path::PathBuf;

/// Errors that can occur while opening or using the device channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial port.
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// Failed to bind to the specified socket path.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified socket path.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial driver reported an error outside of plain I/O.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Auto-detection found no TKey.
    #[error("no TKey found among serial ports")]
    NoDevice,

    /// Auto-detection found more than one TKey.
    #[error("more than one TKey found ({}); pick one explicitly", .0.join(", "))]
    MultipleDevices(Vec<String>),

    /// The device target string could not be understood.
    #[error("invalid device target: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
