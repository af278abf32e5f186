use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::BytesMut;
use tkpattern_transport::ReadTimeout;
use tracing::debug;

use crate::codec::{decode_frame, dump, Cmd, Frame, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(2 * MAX_FRAME_SIZE),
        }
    }

    /// Read the next complete frame without checking what it is (blocking).
    ///
    /// A read timeout surfaces as [`FrameError::Timeout`]; end of stream as
    /// [`FrameError::ConnectionClosed`].
    pub fn read_any(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; MAX_FRAME_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(FrameError::Timeout)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the response to a request and check that it is `expected` under
    /// session `tag`.
    ///
    /// Checks run in a fixed order: the device's not-OK flag, then length
    /// class, endpoint, tag and finally the response code.
    pub fn read_frame<C: Cmd + ?Sized>(&mut self, expected: &C, tag: u8) -> Result<Frame> {
        let frame = self.read_any()?;
        dump(expected.name(), &frame.to_bytes());

        let header = frame.header();
        if header.response_not_ok {
            debug!(rsp = expected.name(), code = frame.code(), "device responded NOK");
            return Err(FrameError::ResponseNotOk { code: frame.code() });
        }
        if header.cmd_len != expected.cmd_len() {
            return Err(FrameError::WrongLength {
                expected: expected.cmd_len(),
                actual: header.cmd_len,
            });
        }
        if header.endpoint != expected.endpoint() {
            return Err(FrameError::WrongEndpoint {
                expected: expected.endpoint(),
                actual: header.endpoint,
            });
        }
        if header.tag != tag {
            return Err(FrameError::WrongTag {
                expected: tag,
                actual: header.tag,
            });
        }
        if frame.code() != expected.code() {
            return Err(FrameError::WrongCode {
                name: expected.name(),
                expected: expected.code(),
                actual: frame.code(),
            });
        }
        Ok(frame)
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + ReadTimeout> FrameReader<T> {
    /// Bound how long [`read_any`](Self::read_any) may block. `None` blocks.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_frame_error)
    }
}

fn transport_to_frame_error(err: tkpattern_transport::TransportError) -> FrameError {
    match err {
        tkpattern_transport::TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{new_frame_buf, CmdLen, Endpoint, FrameHeader, STATUS_OK};

    #[derive(Clone, Copy)]
    struct Rsp(u8, CmdLen, Endpoint);

    impl Cmd for Rsp {
        fn code(&self) -> u8 {
            self.0
        }
        fn cmd_len(&self) -> CmdLen {
            self.1
        }
        fn endpoint(&self) -> Endpoint {
            self.2
        }
        fn name(&self) -> &'static str {
            "rspTest"
        }
    }

    const RSP_SET: Rsp = Rsp(0x04, CmdLen::Len4, Endpoint::App);

    fn wire(rsp: Rsp, tag: u8) -> Vec<u8> {
        new_frame_buf(&rsp, tag).unwrap().to_vec()
    }

    #[test]
    fn reads_expected_response() {
        let mut reader = FrameReader::new(Cursor::new(wire(RSP_SET, 2)));
        let frame = reader.read_frame(&RSP_SET, 2).unwrap();
        assert_eq!(frame.code(), 0x04);
        assert_eq!(frame.status(), Some(STATUS_OK));
    }

    #[test]
    fn not_ok_flag_is_reported_first() {
        let mut bytes = wire(Rsp(0x99, CmdLen::Len1, Endpoint::Firmware), 0);
        let mut header = FrameHeader::parse(bytes[0]).unwrap();
        header.response_not_ok = true;
        bytes[0] = header.to_byte();
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame(&RSP_SET, 2).unwrap_err();
        assert!(matches!(err, FrameError::ResponseNotOk { code: 0x99 }));
    }

    #[test]
    fn mismatches_are_rejected() {
        let cases: [(Vec<u8>, fn(&FrameError) -> bool); 4] = [
            (wire(Rsp(0x04, CmdLen::Len32, Endpoint::App), 2), |e| {
                matches!(e, FrameError::WrongLength { .. })
            }),
            (wire(Rsp(0x04, CmdLen::Len4, Endpoint::Firmware), 2), |e| {
                matches!(e, FrameError::WrongEndpoint { .. })
            }),
            (wire(RSP_SET, 1), |e| {
                matches!(e, FrameError::WrongTag { expected: 2, actual: 1 })
            }),
            (wire(Rsp(0x06, CmdLen::Len4, Endpoint::App), 2), |e| {
                matches!(e, FrameError::WrongCode { expected: 0x04, actual: 0x06, .. })
            }),
        ];

        for (bytes, check) in cases {
            let mut reader = FrameReader::new(Cursor::new(bytes));
            let err = reader.read_frame(&RSP_SET, 2).unwrap_err();
            assert!(check(&err), "unexpected error: {err}");
        }
    }

    #[test]
    fn byte_by_byte_delivery() {
        let reader = ByteByByteReader {
            bytes: wire(RSP_SET, 2),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame(&RSP_SET, 2).unwrap().code(), 0x04);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(Rsp(0x06, CmdLen::Len128, Endpoint::App), 2);
        bytes.truncate(40);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_any().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn would_block_is_a_timeout() {
        let mut reader = FrameReader::new(AlwaysWouldBlock);
        let err = reader.read_any().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn back_to_back_frames_are_split() {
        let mut bytes = wire(RSP_SET, 2);
        bytes.extend(wire(Rsp(0x08, CmdLen::Len1, Endpoint::App), 2));
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_any().unwrap().code(), 0x04);
        assert_eq!(reader.read_any().unwrap().code(), 0x08);
    }

    #[test]
    fn garbage_byte_does_not_wedge_the_reader() {
        let mut bytes = vec![0xff];
        bytes.extend(wire(RSP_SET, 2));
        bytes.extend(wire(RSP_SET, 2));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let err = reader.read_frame(&RSP_SET, 2).unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader(0xff)));
        assert_eq!(reader.read_frame(&RSP_SET, 2).unwrap().code(), 0x04);
        assert_eq!(reader.read_frame(&RSP_SET, 2).unwrap().code(), 0x04);
        assert!(matches!(
            reader.read_any().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct AlwaysWouldBlock;

    impl Read for AlwaysWouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
