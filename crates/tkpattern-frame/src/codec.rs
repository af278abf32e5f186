use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Largest session tag that fits in the header.
pub const MAX_TAG: u8 = 3;

/// Status byte meaning success.
pub const STATUS_OK: u8 = 0;

/// Status byte the device uses for rejected requests.
pub const STATUS_BAD: u8 = 1;

/// Header byte plus the largest length class.
pub const MAX_FRAME_SIZE: usize = 1 + 128;

const RESERVED_BIT: u8 = 0x80;
const NOT_OK_BIT: u8 = 0x04;
const TAG_SHIFT: u8 = 5;
const ENDPOINT_SHIFT: u8 = 3;

/// Length class of a frame: the number of data bytes after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdLen {
    Len1,
    Len4,
    Len32,
    Len128,
}

impl CmdLen {
    /// Data bytes carried by a frame of this class.
    pub const fn bytelen(self) -> usize {
        match self {
            Self::Len1 => 1,
            Self::Len4 => 4,
            Self::Len32 => 32,
            Self::Len128 => 128,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Len1 => 0,
            Self::Len4 => 1,
            Self::Len32 => 2,
            Self::Len128 => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Len1,
            1 => Self::Len4,
            2 => Self::Len32,
            _ => Self::Len128,
        }
    }
}

impl fmt::Display for CmdLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.bytelen())
    }
}

/// Logical destination of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Interface FPGA core.
    HwIfpga,
    /// Application FPGA core.
    HwAfpga,
    /// Device firmware (bootloader mode).
    Firmware,
    /// The loaded device application.
    App,
}

impl Endpoint {
    const fn bits(self) -> u8 {
        match self {
            Self::HwIfpga => 0,
            Self::HwAfpga => 1,
            Self::Firmware => 2,
            Self::App => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::HwIfpga,
            1 => Self::HwAfpga,
            2 => Self::Firmware,
            _ => Self::App,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HwIfpga => "hw-ifpga",
            Self::HwAfpga => "hw-afpga",
            Self::Firmware => "firmware",
            Self::App => "app",
        };
        f.write_str(name)
    }
}

/// Identity of one protocol message: code, frame size and destination.
pub trait Cmd {
    /// One-byte command or response code.
    fn code(&self) -> u8;
    /// Length class of frames carrying this message.
    fn cmd_len(&self) -> CmdLen;
    /// Endpoint the message is addressed to (or comes from).
    fn endpoint(&self) -> Endpoint;
    /// Diagnostic label.
    fn name(&self) -> &'static str;
}

/// Decoded frame header byte.
///
/// ```text
/// bit  7    6..5   4..3      2        1..0
///    ┌────┬──────┬────────┬────────┬─────────┐
///    │ 0  │ tag  │endpoint│ not-OK │ cmd len │
///    └────┴──────┴────────┴────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    pub endpoint: Endpoint,
    pub response_not_ok: bool,
    pub cmd_len: CmdLen,
}

impl FrameHeader {
    /// Header for a frame carrying `cmd` under session `tag`.
    pub fn for_cmd<C: Cmd + ?Sized>(cmd: &C, tag: u8) -> Result<Self> {
        if tag > MAX_TAG {
            return Err(FrameError::InvalidTag(tag));
        }
        Ok(Self {
            tag,
            endpoint: cmd.endpoint(),
            response_not_ok: false,
            cmd_len: cmd.cmd_len(),
        })
    }

    /// Parse a header byte as received from the wire.
    pub fn parse(byte: u8) -> Result<Self> {
        if byte & RESERVED_BIT != 0 {
            return Err(FrameError::InvalidHeader(byte));
        }
        Ok(Self {
            tag: (byte >> TAG_SHIFT) & MAX_TAG,
            endpoint: Endpoint::from_bits(byte >> ENDPOINT_SHIFT),
            response_not_ok: byte & NOT_OK_BIT != 0,
            cmd_len: CmdLen::from_bits(byte),
        })
    }

    /// Encode into the header byte.
    pub fn to_byte(self) -> u8 {
        let mut byte = (self.tag << TAG_SHIFT)
            | (self.endpoint.bits() << ENDPOINT_SHIFT)
            | self.cmd_len.bits();
        if self.response_not_ok {
            byte |= NOT_OK_BIT;
        }
        byte
    }

    /// Total wire size of a frame with this header.
    pub fn frame_size(&self) -> usize {
        1 + self.cmd_len.bytelen()
    }
}

/// One complete frame: header plus exactly `cmd_len` data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    data: Bytes,
}

impl Frame {
    /// Build a frame from a header and its data bytes, zero-padding short data.
    pub fn new(header: FrameHeader, data: &[u8]) -> Result<Self> {
        let len = header.cmd_len.bytelen();
        if data.len() > len {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: len,
            });
        }
        let mut buf = BytesMut::zeroed(len);
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            header,
            data: buf.freeze(),
        })
    }

    pub fn header(&self) -> FrameHeader {
        self.header
    }

    /// Command or response code (first data byte).
    pub fn code(&self) -> u8 {
        self.data[0]
    }

    /// All data bytes, code included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Data after the code: the request payload, or status plus payload of a
    /// response.
    pub fn payload(&self) -> &[u8] {
        &self.data[1..]
    }

    /// Status byte of a response, if the length class has room for one.
    pub fn status(&self) -> Option<u8> {
        self.data.get(1).copied()
    }

    /// Logical response payload after the status byte.
    pub fn response_payload(&self) -> &[u8] {
        self.data.get(2..).unwrap_or(&[])
    }

    /// Wire bytes of this frame.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.header.frame_size());
        buf.put_u8(self.header.to_byte());
        buf.put_slice(&self.data);
        buf
    }
}

/// Allocate a zeroed request frame for `cmd` with header and code filled in.
///
/// Callers write their payload at offset 2.
pub fn new_frame_buf<C: Cmd + ?Sized>(cmd: &C, tag: u8) -> Result<BytesMut> {
    let header = FrameHeader::for_cmd(cmd, tag)?;
    let mut buf = BytesMut::zeroed(header.frame_size());
    buf[0] = header.to_byte();
    buf[1] = cmd.code();
    Ok(buf)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. An invalid header
/// byte is consumed too, so the next call resynchronises on what follows.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    let header = match FrameHeader::parse(first) {
        Ok(header) => header,
        Err(err) => {
            src.advance(1);
            return Err(err);
        }
    };
    if src.len() < header.frame_size() {
        return Ok(None);
    }

    src.advance(1);
    let data = src.split_to(header.cmd_len.bytelen()).freeze();
    Ok(Some(Frame { header, data }))
}

/// Hex dump of a frame at trace level.
pub fn dump(label: &str, frame: &[u8]) {
    trace!(label, len = frame.len(), bytes = %hex::encode(frame), "frame");
}
