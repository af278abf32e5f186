use crate::codec::{CmdLen, Endpoint};

/// Errors that can occur while building, reading or validating frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header byte has its reserved bit set.
    #[error("invalid frame header 0x{0:02x} (reserved bit set)")]
    InvalidHeader(u8),

    /// Session tags are two bits wide.
    #[error("session tag {0} out of range (max 3)")]
    InvalidTag(u8),

    /// The device flagged the response as not OK.
    #[error("device responded NOK (response code 0x{code:02x})")]
    ResponseNotOk { code: u8 },

    /// The response length class does not match the expected response.
    #[error("wrong response length: expected {expected}, got {actual}")]
    WrongLength { expected: CmdLen, actual: CmdLen },

    /// The response came from another endpoint.
    #[error("wrong response endpoint: expected {expected}, got {actual}")]
    WrongEndpoint {
        expected: Endpoint,
        actual: Endpoint,
    },

    /// The response carries another session tag.
    #[error("wrong session tag: expected {expected}, got {actual}")]
    WrongTag { expected: u8, actual: u8 },

    /// The response code is not the one expected for the request.
    #[error("unexpected response {actual:#04x} (expected {name} {expected:#04x})")]
    WrongCode {
        name: &'static str,
        expected: u8,
        actual: u8,
    },

    /// A payload does not fit in the frame it was meant for.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A frame buffer does not match the size its header announces.
    #[error("malformed frame: {size} bytes, header announces {expected}")]
    Malformed { size: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No response arrived within the read timeout.
    #[error("timed out waiting for a response frame")]
    Timeout,

    /// The channel was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that mean "nothing answered in time".
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
