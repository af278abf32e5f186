use tkpattern_codec::EncodingError;
use tkpattern_frame::FrameError;
use tkpattern_transport::TransportError;

/// Coarse classification of a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The pattern text could not be encoded.
    Encoding,
    /// The device answered, but not as the protocol requires.
    Protocol,
    /// Reading or writing the channel failed or timed out.
    Io,
    /// The pattern read back differs from the one sent.
    Consistency,
}

/// Errors that can occur while talking to the device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Pattern encoding error.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The response status byte reports failure.
    #[error("{rsp} reported status {status:#04x}")]
    Status { rsp: &'static str, status: u8 },

    /// A response too short for the record it should carry.
    #[error("{rsp} too short: {len} bytes, need {need}")]
    ShortResponse {
        rsp: &'static str,
        len: usize,
        need: usize,
    },

    /// A chunked transfer moved past the end of its data.
    #[error("transferred more than expected ({offset} of {len} bytes)")]
    Overrun { offset: usize, len: usize },

    /// The device runs an app other than the pattern app.
    #[error("device runs app {name0:?}/{name1:?}, not the pattern app; unplug and replug it")]
    UnexpectedApp { name0: String, name1: String },

    /// The device is in firmware mode and no app binary was provided.
    #[error("device is in firmware mode and no app binary was given")]
    AppRequired,

    /// App binary size outside what the firmware accepts.
    #[error("app binary size {size} out of range (1..={max} bytes)")]
    AppSize { size: usize, max: usize },

    /// The firmware's digest of the loaded app differs from ours.
    #[error("app digest mismatch: device {device}, expected {expected}")]
    DigestMismatch { device: String, expected: String },

    /// The pattern read back differs from the one sent.
    #[error("retrieved pattern is inconsistent: sent {sent} bytes, got {received}{}", .first_difference.map(|i| format!(", first difference at byte {i}")).unwrap_or_default())]
    Inconsistent {
        sent: usize,
        received: usize,
        first_difference: Option<usize>,
    },
}

impl DeviceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) => ErrorClass::Io,
            Self::Frame(err) => match err {
                FrameError::Io(_) | FrameError::Timeout | FrameError::ConnectionClosed => {
                    ErrorClass::Io
                }
                _ => ErrorClass::Protocol,
            },
            Self::Encoding(_) => ErrorClass::Encoding,
            Self::Inconsistent { .. } => ErrorClass::Consistency,
            _ => ErrorClass::Protocol,
        }
    }

    /// True when the device simply did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Frame(err) if err.is_timeout())
    }

    /// True when the device flagged the request as not OK.
    pub fn is_not_ok(&self) -> bool {
        matches!(self, Self::Frame(FrameError::ResponseNotOk { .. }))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
