//! Fixed-size command/response framing for the TKey protocol.
//!
//! Every frame is a one-byte header followed by a fixed number of data bytes
//! selected by the header's length class:
//! - 2 bits session tag, echoed by the device
//! - 2 bits endpoint (hardware, firmware, or the loaded application)
//! - 1 bit response-not-OK, set by the device on rejected commands
//! - 2 bits length class (1, 4, 32 or 128 data bytes)
//!
//! The first data byte is the command or response code. Exactly one request is
//! in flight at a time; the reader validates that each response matches the
//! command identity and session tag the caller expects.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, dump, new_frame_buf, Cmd, CmdLen, Endpoint, Frame, FrameHeader, MAX_FRAME_SIZE,
    MAX_TAG, STATUS_BAD, STATUS_OK,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
