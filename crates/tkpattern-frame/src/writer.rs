use std::io::{ErrorKind, Write};

use crate::codec::{dump, FrameHeader};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write one complete frame buffer (header byte plus data) and flush.
    ///
    /// The buffer must be exactly as long as its header's length class says,
    /// so the device never sees a partially filled frame.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let Some(&first) = frame.first() else {
            return Err(FrameError::Malformed {
                size: 0,
                expected: 1,
            });
        };
        let expected = FrameHeader::parse(first)?.frame_size();
        if frame.len() != expected {
            return Err(FrameError::Malformed {
                size: frame.len(),
                expected,
            });
        }

        dump("tx", frame);
        let mut offset = 0usize;
        while offset < frame.len() {
            match self.inner.write(&frame[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, new_frame_buf, Cmd, CmdLen, Endpoint};

    struct Execute;

    impl Cmd for Execute {
        fn code(&self) -> u8 {
            0x07
        }
        fn cmd_len(&self) -> CmdLen {
            CmdLen::Len1
        }
        fn endpoint(&self) -> Endpoint {
            Endpoint::App
        }
        fn name(&self) -> &'static str {
            "cmdExecute"
        }
    }

    #[test]
    fn writes_whole_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let tx = new_frame_buf(&Execute, 2).unwrap();
        writer.write_frame(&tx).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, vec![0x58, 0x07]);

        let mut buf = BytesMut::from(wire.as_slice());
        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.code(), 0x07);
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.write_frame(&[0x5b, 0x03, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Malformed {
                size: 3,
                expected: 129
            }
        ));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn zero_write_means_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let tx = new_frame_buf(&Execute, 2).unwrap();
        assert!(matches!(
            writer.write_frame(&tx),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn interrupted_write_retries() {
        let mut writer = FrameWriter::new(InterruptOnce {
            interrupted: false,
            out: Vec::new(),
        });
        let tx = new_frame_buf(&Execute, 1).unwrap();
        writer.write_frame(&tx).unwrap();
        assert_eq!(writer.get_ref().out, tx.to_vec());
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        interrupted: bool,
        out: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
