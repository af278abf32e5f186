use std::io::{Read, Write};
use std::time::Duration;

use bytes::Bytes;
use tkpattern_frame::{new_frame_buf, Cmd, Frame, FrameReader, FrameWriter, STATUS_OK};
use tkpattern_transport::{DeviceStream, DeviceTarget, ReadTimeout, TransportConfig};
use tracing::{debug, info};

use crate::commands::AppCmd;
use crate::error::{DeviceError, Result};
use crate::identity::NameVersion;
use crate::transfer::{ChunkReceiver, ChunkSender};

/// Session tag used for every exchange with the pattern app.
pub const DEFAULT_TAG: u8 = 2;

/// Default bound on the identity probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tag carried by every frame of the session (0..=3).
    pub tag: u8,
    /// Read timeout for regular exchanges. `None` blocks; Execute replies only
    /// after the pattern has played, so a bound here must allow for that.
    pub read_timeout: Option<Duration>,
    /// Read timeout for identity probes, which are expected to go unanswered
    /// when the device is in the wrong mode.
    pub probe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG,
            read_timeout: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Exclusive owner of one device channel.
///
/// Strictly half duplex: every call writes one request and reads exactly one
/// response before the next request goes out.
pub struct DeviceSession<R = DeviceStream, W = DeviceStream> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: SessionConfig,
}

impl DeviceSession {
    /// Open the channel to `target` and start a session on it.
    pub fn open(
        target: &DeviceTarget,
        transport: &TransportConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let stream = tkpattern_transport::open(target, transport)?;
        info!(device = %target, kind = stream.kind(), "connected to device");
        Self::from_stream(stream, config)
    }

    /// Start a session on an already open stream.
    pub fn from_stream(stream: DeviceStream, config: SessionConfig) -> Result<Self> {
        let reader = stream.try_clone()?;
        Self::from_parts(reader, stream, config)
    }
}

impl<R: Read + ReadTimeout, W: Write> DeviceSession<R, W> {
    /// Build a session from separate read and write halves.
    pub fn from_parts(reader: R, writer: W, config: SessionConfig) -> Result<Self> {
        let mut reader = FrameReader::new(reader);
        reader.set_read_timeout(config.read_timeout)?;
        Ok(Self {
            reader,
            writer: FrameWriter::new(writer),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Name and version of the running app.
    ///
    /// Uses the short probe timeout, so a device in firmware mode (which
    /// ignores app frames) fails fast with a timeout instead of hanging. The
    /// regular timeout is restored whatever the outcome.
    pub fn get_identity(&mut self) -> Result<NameVersion> {
        let frame = self.probe(&AppCmd::GetNameVersion, &AppCmd::RspGetNameVersion)?;
        let identity = NameVersion::unpack(frame.payload())?;
        debug!(
            name0 = %identity.name0,
            name1 = %identity.name1,
            version = identity.version,
            "app identity"
        );
        Ok(identity)
    }

    /// Upload packed step bytes, announcing `step_count` steps.
    ///
    /// The bytes are not interpreted: one count byte is put in front and the
    /// result goes out in request-sized chunks. Every chunk must be
    /// acknowledged with status OK; the first failure ends the transfer.
    pub fn set_pattern(&mut self, packed: &[u8], step_count: u8) -> Result<()> {
        let capacity = AppCmd::SetPattern.cmd_len().bytelen() - 1;
        let mut sender = ChunkSender::with_count(step_count, packed, capacity);
        debug!(
            steps = step_count,
            bytes = sender.len(),
            frames = sender.chunk_count(),
            "uploading pattern"
        );

        while let Some(chunk) = sender.next_chunk() {
            let sent = chunk.len();
            let rsp = self.exchange(&AppCmd::SetPattern, &AppCmd::RspSetPattern, chunk)?;
            check_status(&rsp, &AppCmd::RspSetPattern)?;
            sender.advance(sent)?;
            debug!(offset = sender.offset(), total = sender.len(), "pattern chunk acknowledged");
        }
        Ok(())
    }

    /// Play the uploaded pattern.
    ///
    /// Returns once the device has accepted the command; the pattern app
    /// answers after playback.
    pub fn execute(&mut self) -> Result<()> {
        let rsp = self.exchange(&AppCmd::Execute, &AppCmd::RspExecute, &[])?;
        check_status(&rsp, &AppCmd::RspExecute)?;
        debug!("pattern executed");
        Ok(())
    }

    /// Read back the stored pattern as `count * step_size` bytes.
    pub fn get_pattern(&mut self, step_size: usize) -> Result<Bytes> {
        let mut receiver = ChunkReceiver::new(step_size);
        while !receiver.is_done() {
            let rsp = self.exchange(&AppCmd::GetPattern, &AppCmd::RspGetPattern, &[])?;
            check_status(&rsp, &AppCmd::RspGetPattern)?;
            receiver.accept(rsp.response_payload())?;
        }
        debug!(
            objects = receiver.object_count().unwrap_or_default(),
            bytes = receiver.received(),
            frames = receiver.frames(),
            "pattern read back"
        );
        Ok(receiver.finish())
    }

    /// One request/response exchange: `payload` goes after the code and the
    /// reply must be `rsp` under this session's tag.
    pub(crate) fn exchange<C: Cmd + ?Sized>(
        &mut self,
        req: &C,
        rsp: &C,
        payload: &[u8],
    ) -> Result<Frame> {
        let mut tx = new_frame_buf(req, self.config.tag)?;
        let room = tx.len() - 2;
        if payload.len() > room {
            return Err(tkpattern_frame::FrameError::PayloadTooLarge {
                size: payload.len(),
                max: room,
            }
            .into());
        }
        tx[2..2 + payload.len()].copy_from_slice(payload);

        debug!(cmd = req.name(), "request");
        self.writer.write_frame(&tx)?;
        Ok(self.reader.read_frame(rsp, self.config.tag)?)
    }

    /// Exchange under the short probe timeout.
    pub(crate) fn probe<C: Cmd + ?Sized>(&mut self, req: &C, rsp: &C) -> Result<Frame> {
        self.reader
            .set_read_timeout(Some(self.config.probe_timeout))?;
        let result = self.exchange(req, rsp, &[]);
        let restored = self.reader.set_read_timeout(self.config.read_timeout);
        let frame = result?;
        restored?;
        Ok(frame)
    }

    /// Give the channel back.
    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }

    /// End the session, releasing the channel.
    pub fn close(self) {
        debug!("closing device session");
        drop(self.into_parts());
    }
}

/// Require status OK on a response that has room for a status byte.
pub(crate) fn check_status<C: Cmd + ?Sized>(frame: &Frame, rsp: &C) -> Result<()> {
    match frame.status() {
        None | Some(STATUS_OK) => Ok(()),
        Some(status) => Err(DeviceError::Status {
            rsp: rsp.name(),
            status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use tkpattern_codec::{encode, PACKED_STEP_SIZE};
    use tkpattern_frame::{FrameError, FrameHeader, STATUS_BAD};
    use tkpattern_transport::TransportError;

    use super::*;
    use crate::sim::SimLink;

    fn session(link: &SimLink) -> DeviceSession<SimLink, SimLink> {
        DeviceSession::from_parts(link.clone(), link.clone(), SessionConfig::default()).unwrap()
    }

    #[test]
    fn identity_of_the_pattern_app() {
        let link = SimLink::app();
        let nv = session(&link).get_identity().unwrap();
        assert!(nv.is_pattern_app());
        assert_eq!(nv.version, 2);
    }

    #[test]
    fn identity_probe_times_out_in_firmware_mode() {
        let link = SimLink::firmware();
        let err = session(&link).get_identity().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn set_execute_get_round_trip() {
        let link = SimLink::app();
        let mut session = session(&link);
        let pattern = encode(".-").unwrap();

        session
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap();
        session.execute().unwrap();
        let back = session.get_pattern(PACKED_STEP_SIZE).unwrap();

        assert_eq!(&back[..], pattern.as_bytes());
        assert_eq!(link.with_device(|d| d.executed().to_vec()), pattern.steps());
    }

    #[test]
    fn multi_frame_transfers() {
        // 64 dots with the trailing separator replaced by a slash: 128 steps.
        let text = format!("{}/", ".".repeat(64));
        let pattern = encode(&text).unwrap();
        assert_eq!(pattern.step_count(), 128);

        let link = SimLink::app();
        let mut session = session(&link);
        session
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap();
        let set_frames = link.with_device(|d| d.request_count(AppCmd::SetPattern));
        // 1 + 256 bytes at 127 per frame
        assert_eq!(set_frames, 3);

        let back = session.get_pattern(PACKED_STEP_SIZE).unwrap();
        assert_eq!(&back[..], pattern.as_bytes());
        // 256 bytes: 125 + 126 + 5
        assert_eq!(link.with_device(|d| d.request_count(AppCmd::GetPattern)), 3);
    }

    #[test]
    fn too_many_steps_for_the_device() {
        let pattern = encode(&".".repeat(100)).unwrap();
        assert_eq!(pattern.step_count(), 199);

        let link = SimLink::app();
        let err = session(&link)
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Status {
                status: STATUS_BAD,
                ..
            }
        ));
        // Rejected on the first chunk; nothing more was sent.
        assert_eq!(link.with_device(|d| d.request_count(AppCmd::SetPattern)), 1);
    }

    #[test]
    fn bad_status_stops_the_transfer() {
        let text = format!("{}/", ".".repeat(64));
        let pattern = encode(&text).unwrap();
        let link = SimLink::app();
        link.with_device(|d| d.fail_next(AppCmd::SetPattern));

        let err = session(&link)
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap_err();
        assert!(matches!(err, DeviceError::Status { rsp: "rspSetPattern", .. }));
        assert_eq!(link.with_device(|d| d.request_count(AppCmd::SetPattern)), 1);
    }

    #[test]
    fn bad_status_mid_upload_stops_at_that_chunk() {
        let text = format!("{}/", ".".repeat(64));
        let pattern = encode(&text).unwrap();
        let link = SimLink::app();
        link.with_device(|d| d.fail_after(AppCmd::SetPattern, 1));

        let err = session(&link)
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Status {
                rsp: "rspSetPattern",
                status: STATUS_BAD
            }
        ));
        let requests = link.with_device(|d| d.requests().to_vec());
        assert_eq!(requests, vec![AppCmd::SetPattern, AppCmd::SetPattern]);
    }

    #[test]
    fn bad_status_mid_download_stops_at_that_frame() {
        let text = format!("{}/", ".".repeat(64));
        let pattern = encode(&text).unwrap();
        let link = SimLink::app();
        let mut session = session(&link);
        session
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap();
        link.with_device(|d| d.fail_after(AppCmd::GetPattern, 1));

        let err = session.get_pattern(PACKED_STEP_SIZE).unwrap_err();
        assert!(matches!(err, DeviceError::Status { rsp: "rspGetPattern", .. }));
        assert_eq!(link.with_device(|d| d.request_count(AppCmd::GetPattern)), 2);
        assert_eq!(link.with_device(|d| d.requests().last().copied()), Some(AppCmd::GetPattern));

        // The device dropped the download, so a fresh read starts over.
        let back = session.get_pattern(PACKED_STEP_SIZE).unwrap();
        assert_eq!(&back[..], pattern.as_bytes());
    }

    #[test]
    fn session_usable_after_probe_timeout() {
        let link = SimLink::firmware();
        let mut session = session(&link);
        assert!(session.get_identity().unwrap_err().is_timeout());

        let firmware = session.probe_firmware().unwrap().expect("firmware answers");
        assert!(firmware.is_firmware());
        assert!(session.get_identity().unwrap_err().is_timeout());
    }

    #[test]
    fn probe_restores_the_regular_timeout() {
        let config = SessionConfig {
            read_timeout: Some(Duration::from_secs(30)),
            probe_timeout: Duration::from_millis(250),
            ..SessionConfig::default()
        };
        let mut session = scripted_with(&[], config);
        assert!(session.get_identity().unwrap_err().is_timeout());

        let (reader, written) = session.into_parts();
        assert_eq!(
            reader.timeouts,
            vec![
                Some(Duration::from_secs(30)),
                Some(Duration::from_millis(250)),
                Some(Duration::from_secs(30)),
            ]
        );
        // cmdGetNameVersion on the app endpoint, tag 2
        assert_eq!(written, vec![0x58, 0x01]);
    }

    #[test]
    fn get_pattern_without_upload_fails() {
        let link = SimLink::app();
        let err = session(&link).get_pattern(PACKED_STEP_SIZE).unwrap_err();
        assert!(matches!(err, DeviceError::Status { rsp: "rspGetPattern", .. }));
    }

    #[test]
    fn session_usable_after_a_failure() {
        let link = SimLink::app();
        let mut session = session(&link);
        assert!(session.get_pattern(PACKED_STEP_SIZE).is_err());

        let pattern = encode("- ").unwrap();
        session
            .set_pattern(pattern.as_bytes(), pattern.step_count())
            .unwrap();
        assert_eq!(&session.get_pattern(PACKED_STEP_SIZE).unwrap()[..], pattern.as_bytes());
    }

    /// Replays canned bytes; used to feed responses the simulator never sends.
    ///
    /// Times out once the script is exhausted and records every timeout it
    /// is given.
    struct Scripted {
        wire: Cursor<Vec<u8>>,
        timeouts: Vec<Option<Duration>>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.wire.read(buf)? {
                0 if !buf.is_empty() => Err(io::Error::from(io::ErrorKind::TimedOut)),
                n => Ok(n),
            }
        }
    }

    impl ReadTimeout for Scripted {
        fn set_read_timeout(
            &mut self,
            timeout: Option<Duration>,
        ) -> std::result::Result<(), TransportError> {
            self.timeouts.push(timeout);
            Ok(())
        }
    }

    fn scripted_with(frames: &[Frame], config: SessionConfig) -> DeviceSession<Scripted, Vec<u8>> {
        let wire = frames.iter().flat_map(|f| f.to_bytes()).collect();
        let reader = Scripted {
            wire: Cursor::new(wire),
            timeouts: Vec::new(),
        };
        DeviceSession::from_parts(reader, Vec::new(), config).unwrap()
    }

    fn scripted(frame: Frame) -> DeviceSession<Scripted, Vec<u8>> {
        scripted_with(&[frame], SessionConfig::default())
    }

    fn rsp_set_ok() -> Frame {
        let header = FrameHeader::for_cmd(&AppCmd::RspSetPattern, DEFAULT_TAG).unwrap();
        Frame::new(header, &[AppCmd::RspSetPattern.code(), STATUS_OK]).unwrap()
    }

    #[test]
    fn wrong_tag_is_a_protocol_error() {
        let header = FrameHeader::for_cmd(&AppCmd::RspExecute, 1).unwrap();
        let frame = Frame::new(header, &[AppCmd::RspExecute.code()]).unwrap();

        let err = scripted(frame).execute().unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Frame(FrameError::WrongTag {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn wrong_code_is_a_protocol_error() {
        let header = FrameHeader::for_cmd(&AppCmd::RspExecute, DEFAULT_TAG).unwrap();
        let frame = Frame::new(header, &[AppCmd::RspSetPattern.code()]).unwrap();

        let err = scripted(frame).execute().unwrap_err();
        assert!(matches!(err, DeviceError::Frame(FrameError::WrongCode { .. })));
    }

    #[test]
    fn request_frames_on_the_wire() {
        let header = FrameHeader::for_cmd(&AppCmd::RspExecute, DEFAULT_TAG).unwrap();
        let frame = Frame::new(header, &[AppCmd::RspExecute.code()]).unwrap();
        let mut session = scripted(frame);
        session.execute().unwrap();

        let (_, written) = session.into_parts();
        assert_eq!(written, vec![0x58, 0x07]);
    }

    #[test]
    fn last_set_pattern_chunk_is_zero_padded() {
        let text = format!("{}/", ".".repeat(64));
        let pattern = encode(&text).unwrap();
        let packed = pattern.as_bytes();
        assert_eq!(packed.len(), 256);

        let mut session =
            scripted_with(&[rsp_set_ok(), rsp_set_ok(), rsp_set_ok()], SessionConfig::default());
        session.set_pattern(packed, pattern.step_count()).unwrap();
        let (_, written) = session.into_parts();

        // [count] + 256 bytes go out as 127 + 127 + 3
        assert_eq!(written.len(), 3 * 129);
        assert_eq!(&written[..3], &[0x5b, 0x03, 128]);
        let last = &written[2 * 129..];
        assert_eq!(&last[..2], &[0x5b, 0x03]);
        assert_eq!(&last[2..5], &packed[253..]);
        assert!(last[5..].iter().all(|&b| b == 0));
    }
}
